use std::fmt;
use std::io::{BufRead, BufReader, ErrorKind, Read, Write};
use std::net::TcpStream;
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use log::warn;
use mpd::idle::{Idle, Subsystem};
use mpd::{Client, Song};

use crate::fetch::ArtSource;

const CONNECT_ATTEMPTS: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_secs(1);

/// Where to find the MPD server: a TCP host/port pair or a unix socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MpdHost {
    Tcp(String),
    Socket(PathBuf),
}

impl fmt::Display for MpdHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MpdHost::Tcp(host) => write!(f, "{host}"),
            MpdHost::Socket(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Connection to MPD over either transport. Dropping the client closes the
/// connection, so the fetch loop releases it on any exit path.
#[derive(Debug)]
pub struct MPDClient {
    host: MpdHost,
    port: u16,
    conn: Connection,
}

#[derive(Debug)]
enum Connection {
    Tcp(Client<TcpStream>),
    Socket(Client<UnixStream>),
}

impl MPDClient {
    /// Connect to MPD, retrying a refused connection a few times before
    /// giving up. Any other failure surfaces immediately.
    pub fn connect(host: &MpdHost, port: u16) -> Result<Self> {
        retry_refused(CONNECT_ATTEMPTS, RETRY_DELAY, || Self::connect_once(host, port))
    }

    fn connect_once(host: &MpdHost, port: u16) -> Result<Self> {
        let conn = match host {
            MpdHost::Tcp(host) => {
                let client = Client::connect((host.as_str(), port))
                    .with_context(|| format!("connecting to mpd at {host}:{port}"))?;
                Connection::Tcp(client)
            }
            MpdHost::Socket(path) => {
                let stream = UnixStream::connect(path)
                    .with_context(|| format!("connecting to mpd socket {}", path.display()))?;
                let client = Client::new(stream)
                    .with_context(|| format!("connecting to mpd socket {}", path.display()))?;
                Connection::Socket(client)
            }
        };
        Ok(MPDClient { host: host.clone(), port, conn })
    }
}

impl ArtSource for MPDClient {
    fn current_song(&mut self) -> Result<Option<Song>> {
        match &mut self.conn {
            Connection::Tcp(client) => Ok(client.currentsong()?),
            Connection::Socket(client) => Ok(client.currentsong()?),
        }
    }

    fn read_picture(&mut self, song: &Song) -> Result<Vec<u8>> {
        read_picture_raw(&self.host, self.port, &song.file)
    }

    fn album_art(&mut self, song: &Song) -> Result<Vec<u8>> {
        match &mut self.conn {
            Connection::Tcp(client) => Ok(client.albumart(song)?),
            Connection::Socket(client) => Ok(client.albumart(song)?),
        }
    }

    fn wait_player(&mut self) -> Result<()> {
        match &mut self.conn {
            Connection::Tcp(client) => client.wait(&[Subsystem::Player])?,
            Connection::Socket(client) => client.wait(&[Subsystem::Player])?,
        };
        Ok(())
    }
}

/// Fetch a song's embedded picture with the `readpicture` command, spoken
/// directly over a short-lived companion connection. The long-lived
/// connection stays parked in `idle` between tracks, where no other
/// command may be issued.
fn read_picture_raw(host: &MpdHost, port: u16, uri: &str) -> Result<Vec<u8>> {
    match host {
        MpdHost::Tcp(host) => {
            let stream = TcpStream::connect((host.as_str(), port))
                .with_context(|| format!("connecting to mpd at {host}:{port}"))?;
            fetch_picture(stream, uri)
        }
        MpdHost::Socket(path) => {
            let stream = UnixStream::connect(path)
                .with_context(|| format!("connecting to mpd socket {}", path.display()))?;
            fetch_picture(stream, uri)
        }
    }
}

/// The picture arrives in binary chunks addressed by byte offset; keep
/// requesting from where the last chunk ended until `size` is reached. An
/// OK without binary data means the song has no (further) picture.
fn fetch_picture<S: Read + Write>(stream: S, uri: &str) -> Result<Vec<u8>> {
    let mut reader = BufReader::new(stream);
    let mut greeting = String::new();
    reader.read_line(&mut greeting)?;
    if !greeting.starts_with("OK MPD") {
        bail!("unexpected mpd greeting: {:?}", greeting.trim_end());
    }

    let mut picture = Vec::new();
    loop {
        let command = format!("readpicture {} {}\n", quote(uri), picture.len());
        reader.get_mut().write_all(command.as_bytes())?;

        match read_chunk(&mut reader, &mut picture)? {
            Chunk::More { total } if picture.len() < total => continue,
            _ => return Ok(picture),
        }
    }
}

enum Chunk {
    Done,
    More { total: usize },
}

fn read_chunk<S: Read>(reader: &mut BufReader<S>, picture: &mut Vec<u8>) -> Result<Chunk> {
    let mut total = None;
    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            bail!("mpd closed the connection mid-response");
        }
        let field = line.trim_end_matches('\n');

        if field == "OK" {
            return Ok(Chunk::Done);
        }
        if let Some(err) = field.strip_prefix("ACK ") {
            bail!("readpicture failed: {err}");
        }
        if let Some(value) = field.strip_prefix("size: ") {
            total = Some(value.parse::<usize>().context("bad size field")?);
        } else if let Some(value) = field.strip_prefix("binary: ") {
            let len: usize = value.parse().context("bad binary field")?;
            let mut chunk = vec![0u8; len];
            reader.read_exact(&mut chunk)?;
            picture.extend_from_slice(&chunk);

            // the raw bytes are followed by a newline and the closing OK
            line.clear();
            reader.read_line(&mut line)?;
            line.clear();
            reader.read_line(&mut line)?;
            if line.trim_end_matches('\n') != "OK" {
                bail!("expected OK after binary chunk, got {:?}", line.trim_end());
            }

            if len == 0 {
                return Ok(Chunk::Done);
            }
            let total = total.context("missing size field before binary data")?;
            return Ok(Chunk::More { total });
        }
        // remaining fields (type, ...) are irrelevant here
    }
}

fn quote(uri: &str) -> String {
    let mut out = String::with_capacity(uri.len() + 2);
    out.push('"');
    for ch in uri.chars() {
        if matches!(ch, '"' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('"');
    out
}

fn retry_refused<T>(
    attempts: u32,
    delay: Duration,
    mut connect: impl FnMut() -> Result<T>,
) -> Result<T> {
    let mut attempt = 1;
    loop {
        match connect() {
            Ok(value) => return Ok(value),
            Err(err) if attempt < attempts && is_connection_refused(&err) => {
                warn!("connection refused (attempt {attempt}/{attempts}), retrying in {delay:?}");
                thread::sleep(delay);
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

fn is_connection_refused(err: &anyhow::Error) -> bool {
    if let Some(io) = err.downcast_ref::<std::io::Error>() {
        return io.kind() == ErrorKind::ConnectionRefused;
    }
    if let Some(mpd::error::Error::Io(io)) = err.downcast_ref::<mpd::error::Error>() {
        return io.kind() == ErrorKind::ConnectionRefused;
    }
    false
}
