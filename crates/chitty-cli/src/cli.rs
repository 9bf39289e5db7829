use std::path::PathBuf;

use clap::Parser;

/// Run a Chitty chat relay.
#[derive(Parser, Debug, Clone)]
#[command(name = "chitty-server", author, version, about, long_about = None)]
pub struct ServerArgs {
    /// Display name for this server.
    #[arg(long, default_value = "default")]
    pub name: String,

    /// Port to listen on. Use 0 for an ephemeral port.
    #[arg(long, default_value_t = 5400)]
    pub port: u16,

    /// Interface to bind to.
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Append logs to this file instead of stderr.
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

impl ServerArgs {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Join a Chitty chat.
#[derive(Parser, Debug, Clone)]
#[command(name = "chitty-client", author, version, about, long_about = None)]
pub struct ClientArgs {
    /// Identity to chat as. Must be unique on the server.
    #[arg(long)]
    pub name: String,

    /// Port of the server to connect to.
    #[arg(long)]
    pub server: u16,

    /// Host of the server to connect to.
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Append logs to this file instead of stderr.
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

impl ClientArgs {
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.server)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_args_defaults() {
        let args = ServerArgs::parse_from(["chitty-server"]);
        assert_eq!(args.name, "default");
        assert_eq!(args.port, 5400);
        assert_eq!(args.bind_addr(), "127.0.0.1:5400");
        assert!(args.log_file.is_none());
    }

    #[test]
    fn test_server_args_overrides() {
        let args = ServerArgs::parse_from([
            "chitty-server",
            "--name",
            "lobby",
            "--port",
            "6000",
            "--host",
            "0.0.0.0",
            "--log-file",
            "server.log",
        ]);
        assert_eq!(args.name, "lobby");
        assert_eq!(args.bind_addr(), "0.0.0.0:6000");
        assert_eq!(args.log_file, Some(PathBuf::from("server.log")));
    }

    #[test]
    fn test_client_args_require_name_and_server() {
        assert!(ClientArgs::try_parse_from(["chitty-client"]).is_err());
        assert!(
            ClientArgs::try_parse_from(["chitty-client", "--name", "alice"]).is_err()
        );

        let args =
            ClientArgs::try_parse_from(["chitty-client", "--name", "alice", "--server", "5400"])
                .unwrap();
        assert_eq!(args.server_addr(), "127.0.0.1:5400");
    }
}
