mod health_check;
mod webhook;
