mod test_bogus_answer_is_reported;
mod test_close_collects_room;
mod test_offline_store_is_reported;
mod test_peer_leave_renegotiates;
mod test_transport_failure_keeps_session;
