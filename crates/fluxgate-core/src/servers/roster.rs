//! Bookkeeping behind [`super::ServerManager`]. Callers hold the manager's lock.

use fluxgate_types::Server;
use std::collections::{HashSet, VecDeque};

/// `rotation` holds exactly the servers that are not blacklisted.
#[derive(Debug, Default)]
pub(super) struct Roster {
    servers: Vec<Server>,
    rotation: VecDeque<Server>,
    blacklist: HashSet<Server>,
}

impl Roster {
    pub(super) fn next(&mut self) -> Option<Server> {
        while let Some(server) = self.rotation.pop_front() {
            if self.blacklist.contains(&server) {
                continue;
            }
            self.rotation.push_back(server.clone());
            return Some(server);
        }
        None
    }

    pub(super) fn has_next(&self) -> bool {
        self.rotation.iter().any(|server| !self.blacklist.contains(server))
    }

    pub(super) fn available(&self) -> usize {
        self.rotation.len()
    }

    pub(super) fn contains(&self, server: &Server) -> bool {
        self.servers.contains(server)
    }

    pub(super) fn add(&mut self, server: Server) -> bool {
        if self.contains(&server) {
            return false;
        }
        self.rotation.push_back(server.clone());
        self.servers.push(server);
        true
    }

    pub(super) fn remove(&mut self, server: &Server) -> Option<Server> {
        let position = self.servers.iter().position(|s| s == server)?;
        let removed = self.servers.remove(position);
        self.blacklist.remove(&removed);
        self.rotation =
            self.servers.iter().filter(|s| !self.blacklist.contains(s)).cloned().collect();
        Some(removed)
    }

    pub(super) fn blacklist(&mut self, server: &Server) -> bool {
        if !self.contains(server) || !self.blacklist.insert(server.clone()) {
            return false;
        }
        self.rotation.retain(|s| s != server);
        true
    }

    pub(super) fn whitelist(&mut self, server: &Server) -> bool {
        if !self.blacklist.remove(server) {
            return false;
        }
        if !self.rotation.contains(server) {
            self.rotation.push_back(server.clone());
        }
        true
    }

    pub(super) fn is_blacklisted(&self, server: &Server) -> bool {
        self.blacklist.contains(server)
    }

    pub(super) fn servers(&self) -> &[Server] {
        &self.servers
    }

    pub(super) fn managed(&self, server: &Server) -> Option<&Server> {
        self.servers.iter().find(|s| *s == server)
    }

    pub(super) fn find_by_id(&self, id: &str) -> Option<Server> {
        self.servers.iter().find(|server| server.id() == id).cloned()
    }
}
