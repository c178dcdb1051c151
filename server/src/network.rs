use std::net::{Shutdown, TcpStream};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::thread;
use std::time::Duration;

use scribble_session_common::messages_common::{Hello, ServerEvent};
use scribble_session_common::network_common::{
    read_frame, read_message, send_frame, server_handshake, NetworkError, NetworkInfo,
};
use tracing::{debug, info, warn};

use crate::connection::{ChannelClosed, Connection, MessageChannel};
use crate::error::LobbyError;
use crate::lobbystate::Lobby;

/// Frames that may be waiting for a slow client before it counts as gone.
const OUTBOUND_QUEUE_SIZE: usize = 256;
/// A single blocked write longer than this drops the client.
const WRITE_TIMEOUT: Duration = Duration::from_secs(5);
/// Time a new client has for the key exchange and its hello.
const HELLO_TIMEOUT: Duration = Duration::from_secs(10);

enum Outbound {
    Frame(String),
    Close,
}

/// Outbound half of a TCP client. Frames are queued and written by a
/// dedicated writer thread, so sending never waits on the socket.
pub struct TcpChannel {
    tx: Option<SyncSender<Outbound>>,
    stream: TcpStream,
}

impl TcpChannel {
    /// Spawns the writer thread for `net_info`.
    pub fn spawn(net_info: NetworkInfo) -> Result<TcpChannel, NetworkError> {
        let stream = net_info.tcp_stream.try_clone()?;
        let (tx, rx) = mpsc::sync_channel(OUTBOUND_QUEUE_SIZE);
        thread::spawn(move || write_frames(net_info, rx));
        Ok(TcpChannel {
            tx: Some(tx),
            stream,
        })
    }
}

impl MessageChannel for TcpChannel {
    fn send(&mut self, frame: String) -> Result<(), ChannelClosed> {
        match &self.tx {
            Some(tx) => tx.try_send(Outbound::Frame(frame)).map_err(|_| ChannelClosed),
            None => Err(ChannelClosed),
        }
    }

    /// Lets the writer flush what is queued, then shuts the socket down.
    fn close(&mut self) {
        if let Some(tx) = self.tx.take() {
            if let Err(TrySendError::Full(_)) = tx.try_send(Outbound::Close) {
                let _ = self.stream.shutdown(Shutdown::Both);
            }
        }
    }
}

fn write_frames(mut net_info: NetworkInfo, rx: Receiver<Outbound>) {
    for outbound in rx.iter() {
        match outbound {
            Outbound::Frame(frame) => {
                if let Err(err) = send_frame(&mut net_info, frame.as_bytes()) {
                    warn!("write to client failed: {}", err);
                    break;
                }
            }
            Outbound::Close => break,
        }
    }
    let _ = net_info.tcp_stream.shutdown(Shutdown::Both);
}

/// The main loop of each individual client.
///
/// Runs the key exchange, joins or reconnects the client based on its hello
/// and then feeds every frame it sends into the lobby until the connection
/// goes away. This function should be run in a separate thread.
///
/// # Arguments
/// * `tcp_stream` - The freshly accepted connection.
/// * `lobby` - The lobby the client plays in.
///
pub fn handle_client(tcp_stream: TcpStream, lobby: Lobby) -> Result<(), NetworkError> {
    let address = tcp_stream.peer_addr()?.ip().to_string();
    tcp_stream.set_read_timeout(Some(HELLO_TIMEOUT))?;
    tcp_stream.set_write_timeout(Some(WRITE_TIMEOUT))?;

    let mut net_info = server_handshake(tcp_stream)?;
    let hello: Hello = read_message(&mut net_info)?;
    net_info.tcp_stream.set_read_timeout(None)?;

    let connection = Connection::new(TcpChannel::spawn(net_info.try_clone()?)?);
    let joined = match hello.session {
        Some(session) => match lobby.reconnect(session, &address, connection.clone()) {
            Err(LobbyError::UnknownPlayer) => {
                debug!(%session, "unknown session, joining as new player");
                lobby.join(&hello.name, &address, connection.clone())
            }
            other => other,
        },
        None => lobby.join(&hello.name, &address, connection.clone()),
    };
    let player = match joined {
        Ok(player) => player,
        Err(err) => {
            info!(address = %address, "join refused: {}", err);
            let _ = connection.send(&ServerEvent::SystemMessage(err.to_string()));
            connection.close();
            return Ok(());
        }
    };

    loop {
        match read_frame(&mut net_info) {
            Ok(frame) => {
                if let Err(LobbyError::UnknownPlayer) = lobby.handle_frame(player.id, &frame) {
                    // kicked or evicted
                    break;
                }
            }
            Err(NetworkError::Io(err)) => {
                debug!(player = %player.id, "read failed: {}", err);
                break;
            }
            Err(NetworkError::Size(size)) => {
                warn!(player = %player.id, size, "oversized frame");
                break;
            }
            Err(err) => warn!(player = %player.id, "dropping malformed frame: {}", err),
        }
    }

    lobby.connection_lost(player.id, connection.id());
    connection.close();
    Ok(())
}
