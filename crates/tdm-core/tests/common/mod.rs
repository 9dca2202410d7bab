pub mod seed_server;
