pub mod login;
pub mod server;

/// Parsed top-level action.
#[derive(Debug)]
pub enum Action {
    Server(server::Args),
    Login(login::Args),
}
