pub mod change_event;
