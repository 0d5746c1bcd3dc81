//! Compact binary persistence for automata.
//!
//! Layout (all integers little-endian):
//!
//! ```text
//! magic        8 bytes  "TMATON01"
//! flags        u8       bit 0 deterministic, bit 1 singleton
//! [singleton]  u32 len, UTF-8 bytes             (only when bit 1 is set)
//! actors       u32 count, then per actor: u32 n_ids, per id: u32 len, bytes
//! states       u32 count
//! initial      u32
//! per state    u8 accept, u32 actor (0 = none, else 1-based index),
//!              u32 n_trans, n_trans x (u32 min, u32 max, u32 to),
//!              u32 n_eps, n_eps x u32
//! ```
//!
//! Reading validates every state reference and range, so a truncated or
//! corrupted file fails with [`io::ErrorKind::InvalidData`] or
//! [`io::ErrorKind::UnexpectedEof`] rather than producing a broken automaton.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::time::Instant;

use rustc_hash::FxHashMap;

use super::actor::Actor;
use super::arena::{Automaton, State, StateId, Transition, CHAR_MAX};

pub const AUTOMATON_MAGIC: &[u8; 8] = b"TMATON01";

const FLAG_DETERMINISTIC: u8 = 0b01;
const FLAG_SINGLETON: u8 = 0b10;

fn invalid(msg: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.into())
}

fn write_u32<W: Write>(w: &mut W, v: usize) -> io::Result<()> {
    let v = u32::try_from(v).map_err(|_| invalid(format!("{v} exceeds u32::MAX")))?;
    w.write_all(&v.to_le_bytes())
}

fn write_str<W: Write>(w: &mut W, s: &str) -> io::Result<()> {
    write_u32(w, s.len())?;
    w.write_all(s.as_bytes())
}

fn read_u8<R: Read>(r: &mut R) -> io::Result<u8> {
    let mut b = [0u8; 1];
    r.read_exact(&mut b)?;
    Ok(b[0])
}

fn read_u32<R: Read>(r: &mut R) -> io::Result<u32> {
    let mut le = [0u8; 4];
    r.read_exact(&mut le)?;
    Ok(u32::from_le_bytes(le))
}

fn read_string<R: Read>(r: &mut R) -> io::Result<String> {
    let len = read_u32(r)? as usize;
    let mut bytes = Vec::new();
    (&mut *r).take(len as u64).read_to_end(&mut bytes)?;
    if bytes.len() != len {
        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "truncated string"));
    }
    String::from_utf8(bytes).map_err(|e| invalid(format!("string is not UTF-8: {e}")))
}

/// Serialize `a` to `w`.
pub fn write_automaton<W: Write>(w: &mut W, a: &Automaton) -> io::Result<()> {
    w.write_all(AUTOMATON_MAGIC)?;
    let mut flags = 0;
    if a.is_deterministic() {
        flags |= FLAG_DETERMINISTIC;
    }
    if a.is_singleton() {
        flags |= FLAG_SINGLETON;
    }
    w.write_all(&[flags])?;
    if let Some(s) = a.singleton() {
        return write_str(w, s);
    }

    // intern actors so shared identifier lists are written once
    let mut actor_index: FxHashMap<&Actor, usize> = FxHashMap::default();
    let mut actors: Vec<&Actor> = Vec::new();
    for state in &a.states {
        if !state.actor.is_none() && !actor_index.contains_key(&state.actor) {
            actor_index.insert(&state.actor, actors.len() + 1);
            actors.push(&state.actor);
        }
    }
    write_u32(w, actors.len())?;
    for actor in &actors {
        write_u32(w, actor.ids().len())?;
        for id in actor.ids() {
            write_str(w, id)?;
        }
    }

    write_u32(w, a.states.len())?;
    write_u32(w, a.initial().index())?;
    for state in &a.states {
        w.write_all(&[state.accept as u8])?;
        write_u32(w, actor_index.get(&state.actor).copied().unwrap_or(0))?;
        write_u32(w, state.transitions.len())?;
        for t in &state.transitions {
            write_u32(w, t.min as usize)?;
            write_u32(w, t.max as usize)?;
            write_u32(w, t.to.index())?;
        }
        write_u32(w, state.epsilons.len())?;
        for e in &state.epsilons {
            write_u32(w, e.index())?;
        }
    }
    Ok(())
}

/// Deserialize an automaton written by [`write_automaton`].
pub fn read_automaton<R: Read>(r: &mut R) -> io::Result<Automaton> {
    let mut magic = [0u8; 8];
    r.read_exact(&mut magic)?;
    if &magic != AUTOMATON_MAGIC {
        return Err(invalid("bad magic in automaton file"));
    }
    let flags = read_u8(r)?;
    if flags & FLAG_SINGLETON != 0 {
        return Ok(Automaton::from_string(&read_string(r)?));
    }

    let actor_count = read_u32(r)? as usize;
    let mut actors = Vec::with_capacity(actor_count.min(1 << 16));
    for _ in 0..actor_count {
        let n = read_u32(r)? as usize;
        let mut ids = Vec::with_capacity(n.min(1 << 10));
        for _ in 0..n {
            ids.push(read_string(r)?);
        }
        actors.push(Actor::from_id_list(ids));
    }

    let count = read_u32(r)? as usize;
    let check = |raw: u32| -> io::Result<StateId> {
        if (raw as usize) < count {
            Ok(StateId::new(raw as usize))
        } else {
            Err(invalid(format!("state reference {raw} out of range (count {count})")))
        }
    };
    let initial = check(read_u32(r)?)?;

    let mut states = Vec::with_capacity(count.min(1 << 20));
    for _ in 0..count {
        let accept = match read_u8(r)? {
            0 => false,
            1 => true,
            other => return Err(invalid(format!("bad accept flag {other}"))),
        };
        let actor = match read_u32(r)? as usize {
            0 => Actor::None,
            n => actors
                .get(n - 1)
                .cloned()
                .ok_or_else(|| invalid(format!("actor reference {n} out of range")))?,
        };
        let n_trans = read_u32(r)? as usize;
        let mut transitions = Vec::with_capacity(n_trans.min(1 << 16));
        for _ in 0..n_trans {
            let min = read_u32(r)?;
            let max = read_u32(r)?;
            if min > max || max > CHAR_MAX {
                return Err(invalid(format!("bad character range {min:#x}..{max:#x}")));
            }
            transitions.push(Transition::new(min, max, check(read_u32(r)?)?));
        }
        let n_eps = read_u32(r)? as usize;
        let mut epsilons = Vec::with_capacity(n_eps.min(1 << 16));
        for _ in 0..n_eps {
            epsilons.push(check(read_u32(r)?)?);
        }
        states.push(State {
            accept,
            transitions,
            epsilons,
            actor,
        });
    }

    let deterministic = flags & FLAG_DETERMINISTIC != 0;
    Ok(Automaton::from_parts(states, initial, deterministic))
}

/// Write `a` to a new file at `path`.
pub fn save_automaton(path: &Path, a: &Automaton) -> io::Result<()> {
    let instant = Instant::now();
    let mut w = BufWriter::new(File::create(path)?);
    write_automaton(&mut w, a)?;
    w.flush()?;
    log::debug!(
        "saved automaton ({} states) to {} in {} ms",
        a.arena_len(),
        path.display(),
        instant.elapsed().as_millis()
    );
    Ok(())
}

/// Read an automaton from the file at `path`.
pub fn load_automaton(path: &Path) -> io::Result<Automaton> {
    let mut r = BufReader::new(File::open(path)?);
    read_automaton(&mut r)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automaton::operations::{run, union};

    fn round_trip(a: &Automaton) -> Automaton {
        let mut buf = Vec::new();
        write_automaton(&mut buf, a).unwrap();
        read_automaton(&mut buf.as_slice()).unwrap()
    }

    #[test]
    fn test_singleton_round_trip() {
        let a = round_trip(&Automaton::from_string("p53"));
        assert_eq!(a.singleton(), Some("p53"));
    }

    #[test]
    fn test_actors_survive_round_trip() {
        let mut a = Automaton::from_string("IL6");
        a.tag_accept_states(&Actor::from_ids("3569;16193"));
        let mut u = union(&a, &Automaton::from_string("IL-6"));
        u.determinize();

        let back = round_trip(&u);
        assert!(back.is_deterministic());
        assert!(run(&back, "IL6"));
        assert!(run(&back, "IL-6"));
        let mut p = back.initial();
        for c in "IL6".chars() {
            p = back.step(p, c as u32).unwrap();
        }
        assert_eq!(back.state(p).actor.joined(), "16193;3569");
    }

    #[test]
    fn test_rejects_bad_magic() {
        let err = read_automaton(&mut &b"NOTMAGIC\0"[..]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_rejects_truncated_input() {
        let mut buf = Vec::new();
        write_automaton(&mut buf, &Automaton::char_range('a' as u32, 'z' as u32)).unwrap();
        buf.truncate(buf.len() - 3);
        assert!(read_automaton(&mut buf.as_slice()).is_err());
    }

    #[test]
    fn test_rejects_dangling_state_reference() {
        let mut buf = Vec::new();
        write_automaton(&mut buf, &Automaton::empty()).unwrap();
        // header(8) + flags(1) + actors(4) + count(4), then initial
        buf[17..21].copy_from_slice(&5u32.to_le_bytes());
        let err = read_automaton(&mut buf.as_slice()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
