pub mod handler_change_event;
