mod test_answerer_waits_for_offer;
mod test_concurrent_open_converges;
mod test_sequential_open_connects;
mod test_webrtc_pair_connects;
