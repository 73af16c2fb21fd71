use anyhow::Result;
use image::RgbaImage;
use log::{debug, error, warn};
use mpd::Song;

/// The MPD operations the fetch loop needs. `MPDClient` implements this
/// over a live connection; tests drive the loop with a scripted fake.
pub trait ArtSource {
    fn current_song(&mut self) -> Result<Option<Song>>;
    fn read_picture(&mut self, song: &Song) -> Result<Vec<u8>>;
    fn album_art(&mut self, song: &Song) -> Result<Vec<u8>>;
    /// Block until the server reports a player-state change.
    fn wait_player(&mut self) -> Result<()>;
}

/// Display update handed to the GUI thread.
#[derive(Debug)]
pub enum ArtUpdate {
    Artwork(RgbaImage),
    Clear,
}

/// Fetch-and-idle loop. Runs on a background thread for the lifetime of
/// the connection: resolve the current track's art, hand the result to the
/// GUI thread, then block until the player state changes. Ends when the
/// idle call fails (connection gone) or the receiver side is dropped; the
/// connection is released with `source` either way.
pub fn run(mut source: impl ArtSource, tx: glib::Sender<ArtUpdate>) {
    loop {
        let update = poll_once(&mut source);
        if tx.send(update).is_err() {
            debug!("display side is gone, stopping fetch loop");
            break;
        }
        if let Err(err) = source.wait_player() {
            error!("lost connection to mpd while idling: {err:#}");
            break;
        }
    }
}

/// One pass of the loop: look up the current track and produce the display
/// update for it. Every failure on the way degrades to `Clear`; a missing
/// or corrupt picture must never take the loop down.
pub fn poll_once(source: &mut impl ArtSource) -> ArtUpdate {
    let song = match source.current_song() {
        Ok(Some(song)) => song,
        Ok(None) => return ArtUpdate::Clear,
        Err(err) => {
            warn!("currentsong query failed: {err:#}");
            return ArtUpdate::Clear;
        }
    };

    let bytes = match fetch_art(source, &song) {
        Some(bytes) => bytes,
        None => return ArtUpdate::Clear,
    };

    match image::load_from_memory(&bytes) {
        Ok(img) => ArtUpdate::Artwork(img.to_rgba8()),
        Err(err) => {
            warn!("could not decode artwork for {}: {err}", song.file);
            ArtUpdate::Clear
        }
    }
}

/// Try the embedded picture first, then the directory cover. An empty
/// response counts as a miss, like an error does.
fn fetch_art(source: &mut impl ArtSource, song: &Song) -> Option<Vec<u8>> {
    match source.read_picture(song) {
        Ok(bytes) if !bytes.is_empty() => return Some(bytes),
        Ok(_) => debug!("no embedded picture in {}", song.file),
        Err(err) => debug!("readpicture failed for {}: {err:#}", song.file),
    }
    match source.album_art(song) {
        Ok(bytes) if !bytes.is_empty() => Some(bytes),
        Ok(_) => {
            debug!("no cover file next to {}", song.file);
            None
        }
        Err(err) => {
            debug!("albumart failed for {}: {err:#}", song.file);
            None
        }
    }
}
