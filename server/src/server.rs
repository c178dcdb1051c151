use std::net::{Ipv4Addr, SocketAddrV4, TcpListener};
use std::thread;

use scribble_session_common::network_common::NetworkError;
use tracing::{info, warn};

use crate::lobbystate::Lobby;
use crate::network::handle_client;

pub struct LobbyServer {
    socket: SocketAddrV4,
    lobby: Lobby,
}

impl LobbyServer {
    /// Initialize the server with the given ip and port.
    /// To start the server, call the run function on the returned LobbyServer.
    ///
    /// # Arguments
    /// * `ip_address` - The ip address of the server.
    /// * `port` - The port to listen on.
    /// * `lobby` - The lobby every client joins.
    pub fn init(ip_address: Ipv4Addr, port: u16, lobby: Lobby) -> Self {
        LobbyServer {
            socket: SocketAddrV4::new(ip_address, port),
            lobby,
        }
    }

    /// Runs the listening server for incoming connections.
    /// Starts a new thread for each incoming connection.
    /// Loops until the listener fails.
    pub fn run(self) -> Result<(), NetworkError> {
        let listener = TcpListener::bind(self.socket)?;
        info!("listening on {}", self.socket);

        for stream in listener.incoming() {
            let stream = match stream {
                Ok(stream) => stream,
                Err(err) => {
                    warn!("failed to accept connection: {}", err);
                    continue;
                }
            };
            if let Ok(address) = stream.peer_addr() {
                info!(%address, "connection received");
            }
            let lobby = self.lobby.clone();
            thread::spawn(move || {
                if let Err(err) = handle_client(stream, lobby) {
                    warn!("client failed: {}", err);
                }
            });
        }

        self.lobby.shutdown();
        Ok(())
    }
}
