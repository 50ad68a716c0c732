mod test_leave_is_idempotent;
mod test_two_peers_single_exchange;
