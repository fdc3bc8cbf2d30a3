//! Games indexed by their join code.

use crate::session::Session;
use crate::words::RandomWords;
use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::GAME_CODE_LENGTH;
use std::collections::HashMap;

/// Code of the game pre-created in dev mode.
pub const DEV_GAME_CODE: &str = "ffff";

/// Owns every live [`Session`]. Codes are stored lower-case and looked up
/// case-insensitively.
pub struct Registry {
    sessions: HashMap<String, Session>,
    rng: StdRng,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    pub fn with_rng(rng: StdRng) -> Self {
        Self {
            sessions: HashMap::new(),
            rng,
        }
    }

    /// Creates a session under `forced_code`, or under a fresh random code.
    /// A forced code that is already taken returns the existing session.
    pub fn create_session(&mut self, forced_code: Option<&str>) -> &mut Session {
        let code = match forced_code {
            Some(code) => code.to_ascii_lowercase(),
            None => self.unused_code(),
        };

        let seed: u64 = self.rng.gen();
        self.sessions.entry(code).or_insert_with_key(|code| {
            info!("Created game {}", code);
            Session::with_sources(
                code.clone(),
                Box::new(RandomWords::with_seed(seed)),
                StdRng::seed_from_u64(seed.wrapping_add(1)),
            )
        })
    }

    fn unused_code(&mut self) -> String {
        loop {
            let code: String = (0..GAME_CODE_LENGTH)
                .map(|_| self.rng.gen_range(b'a'..=b'z') as char)
                .collect();
            if !self.sessions.contains_key(&code) {
                return code;
            }
        }
    }

    pub fn find_session(&self, code: &str) -> Option<&Session> {
        self.sessions.get(&code.to_ascii_lowercase())
    }

    pub fn find_session_mut(&mut self, code: &str) -> Option<&mut Session> {
        self.sessions.get_mut(&code.to_ascii_lowercase())
    }

    pub fn remove_session(&mut self, code: &str) -> bool {
        let removed = self.sessions.remove(&code.to_ascii_lowercase()).is_some();
        if removed {
            info!("Removed game {}", code);
        }
        removed
    }

    pub fn codes(&self) -> Vec<String> {
        let mut codes: Vec<String> = self.sessions.keys().cloned().collect();
        codes.sort();
        codes
    }

    pub fn sessions(&self) -> impl Iterator<Item = &Session> {
        self.sessions.values()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
