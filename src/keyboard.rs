//! Virtual keyboard.
//!
//! Mirrors a mouse-driven piano: at most one key sounds at a time. Pressing a key
//! starts its note, sliding onto another key moves the note, and releasing the
//! key or losing focus ends it.

use solo_plugin::{EventSender, Result};

/// Note of the leftmost key (C3).
pub const BASE_NOTE: u8 = 48;

/// Five octaves.
pub const NUM_KEYS: usize = 60;

/// Two-row computer keyboard layout, lower row from C3, upper row from C4.
const LOWER_ROW: &str = "zsxdcvgbhnjm,l.;/";
const UPPER_ROW: &str = "q2w3er5t6y7ui9o0p[=]";

/// MIDI note for key index `key`, if it is on the keyboard.
pub fn note_for_key(key: usize) -> Option<u8> {
    (key < NUM_KEYS).then(|| BASE_NOTE + key as u8)
}

/// Key under horizontal position `x` for keys `key_width` wide.
pub fn key_at(x: u32, key_width: u32) -> Option<usize> {
    if key_width == 0 {
        return None;
    }
    let key = (x / key_width) as usize;
    (key < NUM_KEYS).then_some(key)
}

/// Key index a computer-keyboard character plays.
pub fn key_for_char(c: char) -> Option<usize> {
    let c = c.to_ascii_lowercase();
    LOWER_ROW
        .find(c)
        .or_else(|| UPPER_ROW.find(c).map(|i| i + 12))
}

pub struct Keyboard {
    sender: EventSender,
    held: Option<usize>,
}

impl Keyboard {
    pub fn new(sender: EventSender) -> Self {
        Self { sender, held: None }
    }

    /// Key currently sounding.
    pub fn held(&self) -> Option<usize> {
        self.held
    }

    /// Press `key`, releasing whatever was held first.
    pub fn press(&mut self, key: usize) -> Result<()> {
        let Some(note) = note_for_key(key) else {
            return Ok(());
        };
        self.release()?;
        self.sender.note_on(note)?;
        self.held = Some(key);
        Ok(())
    }

    /// Pointer moved onto `key` (or off the keyboard) with the button down.
    pub fn slide(&mut self, key: Option<usize>) -> Result<()> {
        if self.held.is_none() || self.held == key {
            return Ok(());
        }
        match key.filter(|&k| k < NUM_KEYS) {
            Some(key) => self.press(key),
            None => self.release(),
        }
    }

    pub fn release(&mut self) -> Result<()> {
        if let Some(key) = self.held.take() {
            if let Some(note) = note_for_key(key) {
                self.sender.note_off(note)?;
            }
        }
        Ok(())
    }

    pub fn focus_lost(&mut self) -> Result<()> {
        self.release()
    }
}

impl Drop for Keyboard {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            tracing::warn!("keyboard release on drop: {e}");
        }
    }
}
