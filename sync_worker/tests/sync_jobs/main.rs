mod helpers;
mod sync_engine;
