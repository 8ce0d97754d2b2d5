use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

use duplex_core::{ChatMessage, PeerId, PeerProfile, RoomId};
use duplex_session::{
    ChatSession, ConnectionStatus, InMemoryPersistence, InMemorySignalingStore,
    JsonlPersistence, LoopbackNetwork, LoopbackTransportFactory, MessagePersistence,
    NegotiationState, SessionBackends, SessionConfig, SessionEvent, TransportConfig,
    TransportFactory, WebRtcTransportFactory,
};

#[derive(Parser)]
#[command(name = "duplex")]
#[command(about = "Peer-to-peer chat sessions bootstrapped over a shared document store")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum TransportKind {
    /// Real peer connections through the local network stack.
    Webrtc,
    /// In-process transport, no network needed.
    Loopback,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the room key two peers rendezvous on.
    RoomId { a: String, b: String },

    /// Run two peers in this process and let them chat.
    Demo {
        #[arg(long, value_enum, default_value = "loopback")]
        transport: TransportKind,

        /// ICE server URLs for the webrtc transport.
        #[arg(long = "ice-server", env = "DUPLEX_ICE_SERVERS", value_delimiter = ',')]
        ice_servers: Vec<String>,

        /// Close the second peer after the first exchange and bring it back.
        #[arg(long)]
        rejoin: bool,

        /// Persist the conversation as JSON lines under this directory.
        #[arg(long, env = "DUPLEX_HISTORY_DIR")]
        history_dir: Option<PathBuf>,

        /// Seconds to wait for each connection.
        #[arg(long, default_value_t = 15)]
        timeout: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    match Cli::parse().command {
        Commands::RoomId { a, b } => {
            println!("{}", RoomId::for_peers(&PeerId::from(a), &PeerId::from(b)));
        }
        Commands::Demo {
            transport,
            ice_servers,
            rejoin,
            history_dir,
            timeout,
        } => {
            let mut transport_config = TransportConfig::default();
            if !ice_servers.is_empty() {
                transport_config.ice_servers = ice_servers;
            }
            if matches!(transport, TransportKind::Webrtc) {
                transport_config.include_loopback_candidates = true;
            }
            let demo = Demo::new(transport, transport_config, history_dir, timeout);
            demo.run(rejoin).await?;
        }
    }

    Ok(())
}

struct Demo {
    backends: SessionBackends,
    config: SessionConfig,
    timeout: Duration,
    alice: PeerProfile,
    bob: PeerProfile,
}

impl Demo {
    fn new(
        transport: TransportKind,
        transport_config: TransportConfig,
        history_dir: Option<PathBuf>,
        timeout: u64,
    ) -> Self {
        let transports: Arc<dyn TransportFactory> = match transport {
            TransportKind::Webrtc => Arc::new(WebRtcTransportFactory),
            TransportKind::Loopback => {
                Arc::new(LoopbackTransportFactory::new(LoopbackNetwork::new()))
            }
        };
        let persistence: Arc<dyn MessagePersistence> = match history_dir {
            Some(dir) => Arc::new(JsonlPersistence::new(dir)),
            None => Arc::new(InMemoryPersistence::new()),
        };

        Self {
            backends: SessionBackends {
                signaling: Arc::new(InMemorySignalingStore::new()),
                transports,
                persistence,
            },
            config: SessionConfig {
                transport: transport_config,
                ..Default::default()
            },
            timeout: Duration::from_secs(timeout),
            alice: PeerProfile::new("alice", "Alice"),
            bob: PeerProfile::new("bob", "Bob"),
        }
    }

    fn open(&self, local: &PeerProfile, remote: &PeerProfile) -> ChatSession {
        let (session, events) = ChatSession::open(
            self.config.clone(),
            local.clone(),
            remote.clone(),
            self.backends.clone(),
        );
        tokio::spawn(print_events(local.name.clone(), events));
        session
    }

    async fn run(&self, rejoin: bool) -> Result<()> {
        println!("{}", "Opening chat between Alice and Bob...".green().bold());
        let alice = self.open(&self.alice, &self.bob);
        let mut bob = self.open(&self.bob, &self.alice);
        println!("   Room: {}", alice.room_id().to_string().cyan());

        self.wait_connected(&alice).await?;
        self.wait_connected(&bob).await?;
        println!("{}", "Connected.".green().bold());

        self.exchange(&alice, &bob, "hi Bob", "hi Alice").await?;

        if rejoin {
            println!("{}", "Bob leaves the chat...".yellow().bold());
            let mut alice_events = alice.subscribe_events();
            bob.close().await;
            wait_for_renegotiation(&mut alice_events, self.timeout).await?;

            println!("{}", "Bob comes back...".yellow().bold());
            bob = self.open(&self.bob, &self.alice);
            self.wait_connected(&alice).await?;
            self.wait_connected(&bob).await?;
            println!("{}", "Reconnected.".green().bold());

            self.exchange(&alice, &bob, "welcome back", "thanks").await?;
        }

        println!("{}", "Alice's log:".bold());
        for message in alice.messages() {
            print_message(&message);
        }

        alice.close().await;
        bob.close().await;

        let summaries = self
            .backends
            .persistence
            .conversation_summaries(&self.alice.id)
            .await
            .context("Failed to read conversation summaries")?;
        for summary in summaries {
            println!(
                "   {} {}: \"{}\"",
                "Last with".dimmed(),
                summary.other_name,
                summary.last_message
            );
        }
        Ok(())
    }

    async fn wait_connected(&self, session: &ChatSession) -> Result<()> {
        let name = &session.local().name;
        let mut status = session.status();
        let mut state = session.state();
        tokio::time::timeout(self.timeout, async {
            status
                .wait_for(|s| *s == ConnectionStatus::Connected)
                .await
                .map(|_| ())?;
            state
                .wait_for(|s| *s == NegotiationState::Connected)
                .await
                .map(|_| ())
        })
        .await
        .with_context(|| format!("{} did not connect in time", name))?
        .with_context(|| format!("{}'s session stopped", name))
    }

    async fn exchange(
        &self,
        alice: &ChatSession,
        bob: &ChatSession,
        question: &str,
        reply: &str,
    ) -> Result<()> {
        let before = bob.messages().len();
        alice
            .send_message(question)
            .await?
            .context("Alice has no open data channel")?;
        wait_for_log(bob, before + 1, self.timeout).await?;

        let before = alice.messages().len();
        bob.send_message(reply)
            .await?
            .context("Bob has no open data channel")?;
        wait_for_log(alice, before + 1, self.timeout).await
    }
}

async fn wait_for_log(session: &ChatSession, len: usize, timeout: Duration) -> Result<()> {
    let mut log = session.watch_messages();
    tokio::time::timeout(timeout, log.wait_for(|log| log.len() >= len))
        .await
        .context("Message did not arrive in time")?
        .context("Session stopped")?;
    Ok(())
}

async fn wait_for_renegotiation(
    events: &mut broadcast::Receiver<SessionEvent>,
    timeout: Duration,
) -> Result<()> {
    tokio::time::timeout(timeout, async {
        loop {
            match events.recv().await {
                Ok(SessionEvent::Renegotiating) => return Ok(()),
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => {
                    anyhow::bail!("Session stopped")
                }
            }
        }
    })
    .await
    .context("Peer departure was not noticed")?
}

fn print_message(message: &ChatMessage) {
    let time = message.timestamp.format("%H:%M:%S");
    if message.is_from_me() {
        println!("   [{}] {} {}", time, "me:".blue().bold(), message.body);
    } else {
        println!(
            "   [{}] {} {}",
            time,
            format!("{}:", message.sender_name).magenta().bold(),
            message.body
        );
    }
}

async fn print_events(name: String, mut events: broadcast::Receiver<SessionEvent>) {
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => break,
        };
        match event {
            SessionEvent::RoleResolved(role) => {
                println!("   {} is {}", name, role.to_string().cyan());
            }
            SessionEvent::StatusChanged(status) => {
                println!("   {} sees the peer as {:?}", name, status);
            }
            SessionEvent::Renegotiating => {
                println!("   {} {}", name, "renegotiates".yellow());
            }
            SessionEvent::Error(e) => {
                println!("   {} {} {}", name, "error:".red().bold(), e);
            }
            SessionEvent::Closed => break,
            _ => {}
        }
    }
}
