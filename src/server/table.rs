//! Fixed-capacity connection table.
//!
//! Slots are addressed by their `mio::Token`. Token 0 belongs to the
//! listener, so slot `i` maps to `Token(i + 1)`. A freed slot is reused by
//! the next accepted connection (lowest free index first).

use mio::Token;

use crate::http::connection::Connection;

pub struct ConnectionTable<S> {
    slots: Vec<Option<Connection<S>>>,
    active: usize,
}

impl<S> ConnectionTable<S> {
    pub fn new(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Self { slots, active: 0 }
    }

    /// Stores `conn` in the first free slot.
    ///
    /// Gives the connection back when the table is full so the caller can
    /// drop (and thereby close) it.
    pub fn insert(&mut self, conn: Connection<S>) -> Result<Token, Connection<S>> {
        let Some(index) = self.slots.iter().position(Option::is_none) else {
            return Err(conn);
        };

        self.slots[index] = Some(conn);
        self.active += 1;
        Ok(Token(index + 1))
    }

    pub fn get_mut(&mut self, token: Token) -> Option<&mut Connection<S>> {
        let index = token.0.checked_sub(1)?;
        self.slots.get_mut(index)?.as_mut()
    }

    /// Frees the slot, returning its connection.
    pub fn remove(&mut self, token: Token) -> Option<Connection<S>> {
        let index = token.0.checked_sub(1)?;
        let conn = self.slots.get_mut(index)?.take()?;
        self.active -= 1;
        Some(conn)
    }

    /// Frees every slot.
    pub fn drain(&mut self) -> Vec<(Token, Connection<S>)> {
        self.active = 0;
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(i, slot)| slot.take().map(|conn| (Token(i + 1), conn)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.active
    }

    pub fn is_empty(&self) -> bool {
        self.active == 0
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn is_full(&self) -> bool {
        self.active == self.slots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn conn() -> Connection<Cursor<Vec<u8>>> {
        Connection::new(Cursor::new(Vec::new()), None, 64)
    }

    #[test]
    fn full_table_hands_connection_back() {
        let mut table = ConnectionTable::new(2);

        assert_eq!(table.insert(conn()).ok(), Some(Token(1)));
        assert_eq!(table.insert(conn()).ok(), Some(Token(2)));
        assert!(table.is_full());
        assert!(table.insert(conn()).is_err());
    }

    #[test]
    fn freed_slot_is_reused() {
        let mut table = ConnectionTable::new(3);
        let a = table.insert(conn()).ok().unwrap();
        let _b = table.insert(conn()).ok().unwrap();

        assert!(table.remove(a).is_some());
        assert!(table.remove(a).is_none());
        assert_eq!(table.len(), 1);
        assert_eq!(table.insert(conn()).ok(), Some(a));
    }

    #[test]
    fn listener_token_is_never_a_slot() {
        let mut table = ConnectionTable::<Cursor<Vec<u8>>>::new(1);

        assert!(table.get_mut(Token(0)).is_none());
        assert!(table.remove(Token(0)).is_none());
        assert!(table.get_mut(Token(7)).is_none());
    }

    #[test]
    fn drain_empties_table() {
        let mut table = ConnectionTable::new(3);
        table.insert(conn()).ok().unwrap();
        table.insert(conn()).ok().unwrap();

        let drained = table.drain();

        assert_eq!(drained.len(), 2);
        assert!(table.is_empty());
    }
}
