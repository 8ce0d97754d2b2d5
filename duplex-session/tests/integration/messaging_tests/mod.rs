mod test_history_reload;
mod test_message_delivery;
mod test_persistence_failure_keeps_log;
mod test_send_before_connect;
