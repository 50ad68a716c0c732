mod test_room_released_after_last_leave;
