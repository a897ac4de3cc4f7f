//! C5 — persistence: serialize/deserialize the dictionary to/from the
//! nonvolatile store (§4.3).
//!
//! ```text
//! byte 0..1   signature: 0x4E34 ("N4") or 0xCEB4 (auto-run variant)
//! byte 2..3   last (big-endian)
//! byte 4..5   here (big-endian)
//! byte 6..    raw bytes dic[0 .. here)
//! ```

use core::fmt;

use forth_core::NvStore;

use crate::arena::{Arena, Iu, LFA_END};

/// Plain-save signature, `"N4"` as a big-endian `u16`.
pub const SIG_PLAIN: u16 = 0x4E34;
/// Auto-run signature: the plain signature with the top bit of each byte
/// set.
pub const SIG_AUTO: u16 = SIG_PLAIN | 0x8080;
/// Header size in bytes: 2-byte signature + 2-byte `last` + 2-byte `here`.
pub const HDR_SZ: usize = 6;

/// Failure mode for [`save`]. `load` never fails — a bad or absent image is
/// a silent no-op per §7.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistError {
    /// The store is too small to hold the header plus the current
    /// dictionary (`6 + here` bytes).
    TooSmall { needed: usize, available: usize },
}

impl fmt::Display for PersistError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooSmall { needed, available } => write!(
                f,
                "dictionary too large for store: need {needed} bytes, have {available}"
            ),
        }
    }
}

impl core::error::Error for PersistError {}

/// Persist `arena`'s dictionary prefix `[0, here)` to `store`.
///
/// Checks capacity before writing anything, so on [`PersistError::TooSmall`]
/// the store is left untouched (§7: "no side effects beyond the header
/// bytes already written" — here, none are).
pub fn save(arena: &Arena, store: &mut impl NvStore, autorun: bool) -> Result<(), PersistError> {
    let here = arena.here() as usize;
    let needed = HDR_SZ + here;
    if needed > store.length() {
        return Err(PersistError::TooSmall {
            needed,
            available: store.length(),
        });
    }

    let sig = if autorun { SIG_AUTO } else { SIG_PLAIN };
    let last = arena.last();
    store.update(0, (sig >> 8) as u8);
    store.update(1, (sig & 0xFF) as u8);
    store.update(2, (last >> 8) as u8);
    store.update(3, (last & 0xFF) as u8);
    store.update(4, (here >> 8) as u8);
    store.update(5, (here & 0xFF) as u8);
    for i in 0..here {
        store.update(HDR_SZ + i, arena.get(i as Iu));
    }
    Ok(())
}

/// Restore a dictionary image from `store` into `arena`.
///
/// If `autorun` is requested, succeeds only when the store carries the
/// auto-run signature; otherwise only the plain signature matches. On a
/// signature mismatch this is a silent no-op (§7) and the arena is left
/// untouched. On success, returns the execution token of the last-saved
/// word if the auto-run signature was present, or [`LFA_END`] otherwise.
pub fn load(arena: &mut Arena, store: &impl NvStore, autorun: bool) -> Iu {
    if store.length() < HDR_SZ {
        return LFA_END;
    }
    let sig = (u16::from(store.read(0)) << 8) | u16::from(store.read(1));
    let want = if autorun { SIG_AUTO } else { SIG_PLAIN };
    if sig != want {
        return LFA_END;
    }

    let last = (u16::from(store.read(2)) << 8) | u16::from(store.read(3));
    let here = (u16::from(store.read(4)) << 8) | u16::from(store.read(5));
    let here_usize = here as usize;
    if here_usize > arena.dic_sz() || HDR_SZ + here_usize > store.length() {
        return LFA_END;
    }

    for i in 0..here_usize {
        arena.set(i as Iu, store.read(HDR_SZ + i));
    }
    arena.set_here(here);
    arena.set_last(last);

    if sig == SIG_AUTO && last != LFA_END {
        last.wrapping_add(5) // XT = lfa + sizeof(link) + sizeof(name)
    } else {
        LFA_END
    }
}
