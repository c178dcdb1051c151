use chacha20poly1305::{Key, Nonce};
use rand::Rng;
use rand_core::OsRng;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::{Read, Write};
use std::net::TcpStream;
use thiserror::Error;
use x25519_dalek::{PublicKey, ReusableSecret};

#[cfg(not(feature = "no-encryption"))]
use {
    chacha20poly1305::aead::{Aead, NewAead},
    chacha20poly1305::ChaCha20Poly1305,
    generic_array::GenericArray,
};

/// Size of the nonce that precedes every ciphertext.
const NONCE_SIZE: usize = 12;
/// Size of the crc32 checksum appended to every plaintext.
const CHECKSUM_SIZE: usize = 4;
/// Upper bound for a single frame, protects against bogus length prefixes.
pub const MAX_MESSAGE_SIZE: usize = 4 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("checksum is not correct")]
    Checksum,
    #[error("encryption failed")]
    Encryption,
    #[error("decryption failed")]
    Decryption,
    #[error("message of {0} bytes is malformed or too large")]
    Size(usize),
}

/// An established, keyed connection between a client and the server.
pub struct NetworkInfo {
    /// The tcp_stream of the connection.
    pub tcp_stream: TcpStream,
    /// The shared secret of the client and server.
    pub key: Key,
}

impl NetworkInfo {
    /// Second handle on the same connection, so reading and writing can
    /// happen on different threads.
    pub fn try_clone(&self) -> Result<NetworkInfo, NetworkError> {
        Ok(NetworkInfo {
            tcp_stream: self.tcp_stream.try_clone()?,
            key: self.key,
        })
    }
}

/// Verifies if the checksum of the text is correct.
///
/// # Arguments
/// * `text` - The text to be verified.
/// * `checksum` - The checksum to be verified.
///
pub fn check_checksum(text: &[u8], checksum: u32) -> Result<(), NetworkError> {
    if checksum == crc32fast::hash(text) {
        Ok(())
    } else {
        Err(NetworkError::Checksum)
    }
}

/// Generates a new Public Private keypair.
///
/// # Returns
/// * `public_key` - A Public key.
/// * `secret_key` - A ReusableSecret key.
///
pub fn generate_keypair() -> (PublicKey, ReusableSecret) {
    let secret = ReusableSecret::new(OsRng);
    let public = PublicKey::from(&secret);
    (public, secret)
}

/// Server side of the key exchange: send our public key, read the client's
/// and derive the shared key from both.
pub fn server_handshake(mut tcp_stream: TcpStream) -> Result<NetworkInfo, NetworkError> {
    let (public_key, secret_key) = generate_keypair();
    tcp_stream.write_all(public_key.as_bytes())?;

    let mut buffer = [0; 32];
    tcp_stream.read_exact(&mut buffer)?;
    let client_public = PublicKey::from(buffer);
    let shared_secret = secret_key.diffie_hellman(&client_public);

    Ok(NetworkInfo {
        tcp_stream,
        key: *Key::from_slice(shared_secret.as_bytes()),
    })
}

/// Client side of the key exchange.
pub fn client_handshake(mut tcp_stream: TcpStream) -> Result<NetworkInfo, NetworkError> {
    let (public_key, secret_key) = generate_keypair();

    let mut buffer = [0; 32];
    tcp_stream.read_exact(&mut buffer)?;
    tcp_stream.write_all(public_key.as_bytes())?;
    let server_public = PublicKey::from(buffer);
    let shared_secret = secret_key.diffie_hellman(&server_public);

    Ok(NetworkInfo {
        tcp_stream,
        key: *Key::from_slice(shared_secret.as_bytes()),
    })
}

/// Encrypts a JSON message
///
/// # Arguments
/// * `json_message` - The message to be encrypted.
/// * `shared_key` - The shared key to be used for encryption.
///
/// # Returns
/// * packed_message Vec<u8> - The packed network encrypted message.
///
pub fn encrypt_json(mut json_message: Vec<u8>, _shared_key: &Key) -> Result<Vec<u8>, NetworkError> {
    let nonce = *Nonce::from_slice(rand::thread_rng().gen::<[u8; NONCE_SIZE]>().as_slice());
    let checksum = crc32fast::hash(&json_message[..]);
    json_message.extend_from_slice(&checksum.to_be_bytes());

    #[cfg(not(feature = "no-encryption"))]
    let ciphertext = ChaCha20Poly1305::new(_shared_key)
        .encrypt(&nonce, &json_message[..])
        .map_err(|_: aead::Error| NetworkError::Encryption)?;

    #[cfg(feature = "no-encryption")]
    let ciphertext = json_message;

    let msg_size = ciphertext.len() + NONCE_SIZE;
    Ok(pack_network_message(msg_size, nonce, ciphertext))
}

/// Decrypts a JSON message
///
/// # Arguments
/// * `msg_buf` - The message buffer to be decrypted, nonce first.
/// * `key` - The shared key to be used for decryption.
///
/// # Returns
/// * Result<Vec<u8>, NetworkError> - The checked json bytes if ok
///
pub fn decrypt_message(msg_buf: &[u8], _key: &Key) -> Result<Vec<u8>, NetworkError> {
    if msg_buf.len() < NONCE_SIZE + CHECKSUM_SIZE {
        return Err(NetworkError::Size(msg_buf.len()));
    }

    #[cfg(not(feature = "no-encryption"))]
    let plaintext = {
        let cipher = ChaCha20Poly1305::new(_key);
        let nonce: Nonce = GenericArray::clone_from_slice(&msg_buf[0..NONCE_SIZE]);
        cipher
            .decrypt(&nonce, &msg_buf[NONCE_SIZE..])
            .map_err(|_: aead::Error| NetworkError::Decryption)?
    };

    #[cfg(feature = "no-encryption")]
    let plaintext = msg_buf[NONCE_SIZE..].to_vec();

    if plaintext.len() < CHECKSUM_SIZE {
        return Err(NetworkError::Size(plaintext.len()));
    }
    let (text, checksum) = plaintext.split_at(plaintext.len() - CHECKSUM_SIZE);
    let mut checksum_bytes = [0; CHECKSUM_SIZE];
    checksum_bytes.copy_from_slice(checksum);
    check_checksum(text, u32::from_be_bytes(checksum_bytes))?;
    Ok(text.to_vec())
}

/// Packs the components of a message into a singular message
///
/// # Arguments
/// * `msg_size` - The size of the message.
/// * `nonce` - The nonce of the message.
/// * `ciphertext` - The cipher text of the message, checksum included.
///
fn pack_network_message(msg_size: usize, nonce: Nonce, ciphertext: Vec<u8>) -> Vec<u8> {
    let mut message = Vec::with_capacity(msg_size + (usize::BITS / 8) as usize);
    message.extend_from_slice(&msg_size.to_le_bytes());
    message.extend_from_slice(&nonce);
    message.extend_from_slice(&ciphertext);
    message
}

/// Writes an already serialized JSON frame.
pub fn send_frame(net_info: &mut NetworkInfo, frame: &[u8]) -> Result<(), NetworkError> {
    let packed = encrypt_json(frame.to_vec(), &net_info.key)?;
    net_info.tcp_stream.write_all(&packed)?;
    Ok(())
}

/// Serializes and sends a message.
///
/// # Arguments
/// * `net_info` - The network information of the connection.
/// * `msg` - The message to be sent.
///
pub fn send_message<T: Serialize>(net_info: &mut NetworkInfo, msg: &T) -> Result<(), NetworkError> {
    let frame = serde_json::to_vec(msg)?;
    send_frame(net_info, &frame)
}

/// Reads one frame and returns the checked JSON bytes.
///
/// # Arguments
/// * `net_info` - The network information of the connection.
///
/// # Returns
/// * `Ok(bytes)` - The JSON bytes of the message.
/// * `Err(e)` - The error that occurred.
///
pub fn read_frame(net_info: &mut NetworkInfo) -> Result<Vec<u8>, NetworkError> {
    let mut size = [0; (usize::BITS / 8) as usize];
    net_info.tcp_stream.read_exact(&mut size)?;
    let msg_size = usize::from_le_bytes(size);
    if msg_size > MAX_MESSAGE_SIZE {
        return Err(NetworkError::Size(msg_size));
    }

    let mut msg_buf = vec![0; msg_size];
    net_info.tcp_stream.read_exact(&mut msg_buf)?;

    decrypt_message(&msg_buf, &net_info.key)
}

/// Reads one frame and deserializes it.
pub fn read_message<T: DeserializeOwned>(net_info: &mut NetworkInfo) -> Result<T, NetworkError> {
    let frame = read_frame(net_info)?;
    Ok(serde_json::from_slice(&frame)?)
}
