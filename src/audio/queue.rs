use std::collections::{HashSet, VecDeque};
use std::time::Duration;
use tracing::debug;

use crate::{
    error::{PlayerError, Result},
    sources::{ItemKey, PlayableItem},
};

/// Último elemento de [`SongQueue::peek_upcoming`] cuando quedan más canciones
pub const TRUNCATION_MARKER: &str = "⋯";

/// Cola ordenada de canciones pendientes, sin claves repetidas.
///
/// No tiene lock propio: vive dentro del lock de su sesión, así que cada
/// llamada `&mut self` ya tiene un único escritor.
#[derive(Debug)]
pub struct SongQueue {
    items: VecDeque<PlayableItem>,
    keys: HashSet<ItemKey>,
    max_size: usize,
}

impl SongQueue {
    pub fn new(max_size: usize) -> Self {
        Self {
            items: VecDeque::new(),
            keys: HashSet::new(),
            max_size,
        }
    }

    /// Agrega una canción al final de la cola
    pub fn enqueue(&mut self, item: PlayableItem) -> Result<()> {
        self.admit(&item)?;
        debug!("➕ Agregado a la cola: {}", item.title());
        self.items.push_back(item);
        Ok(())
    }

    /// Pone una canción al frente para que suene después de la actual
    pub fn push(&mut self, item: PlayableItem) -> Result<()> {
        self.admit(&item)?;
        debug!("⏫ Agregado al frente: {}", item.title());
        self.items.push_front(item);
        Ok(())
    }

    /// Inserta justo detrás de `anchor`, o al frente si `anchor` ya salió de
    /// la cola
    pub fn insert_after(&mut self, anchor: &ItemKey, item: PlayableItem) -> Result<()> {
        self.admit(&item)?;
        let index = self
            .items
            .iter()
            .position(|queued| queued.key() == anchor)
            .map_or(0, |i| i + 1);
        debug!("📍 Insertado en la posición {}: {}", index, item.title());
        self.items.insert(index, item);
        Ok(())
    }

    /// Saca la siguiente canción
    pub fn pop_front(&mut self) -> Result<PlayableItem> {
        let item = self.items.pop_front().ok_or(PlayerError::EmptyQueue)?;
        self.keys.remove(item.key());
        Ok(item)
    }

    /// Quita cualquier canción por su clave
    pub fn remove(&mut self, key: &ItemKey) -> Result<PlayableItem> {
        let index = self
            .items
            .iter()
            .position(|queued| queued.key() == key)
            .ok_or_else(|| PlayerError::NotFound(key.to_string()))?;
        let item = self
            .items
            .remove(index)
            .ok_or_else(|| PlayerError::NotFound(key.to_string()))?;
        self.keys.remove(item.key());
        debug!("❌ Removido de la cola: {}", item.title());
        Ok(item)
    }

    /// Hasta `n` títulos en orden de reproducción, seguidos de
    /// [`TRUNCATION_MARKER`] si la cola tiene más de `n` canciones
    pub fn peek_upcoming(&self, n: usize) -> Vec<String> {
        let mut titles: Vec<String> = self
            .items
            .iter()
            .take(n)
            .map(|item| item.title().to_string())
            .collect();
        if self.items.len() > n {
            titles.push(TRUNCATION_MARKER.to_string());
        }
        titles
    }

    pub fn contains(&self, key: &ItemKey) -> bool {
        self.keys.contains(key)
    }

    pub fn clear(&mut self) -> usize {
        let cleared = self.items.len();
        self.items.clear();
        self.keys.clear();
        cleared
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn total_duration(&self) -> Duration {
        self.items.iter().filter_map(|item| item.duration()).sum()
    }

    fn admit(&mut self, item: &PlayableItem) -> Result<()> {
        if self.keys.contains(item.key()) {
            return Err(PlayerError::DuplicateKey(item.key().to_string()));
        }
        if self.items.len() >= self.max_size {
            return Err(PlayerError::QueueFull(self.max_size));
        }
        self.keys.insert(item.key().clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn song(title: &str) -> PlayableItem {
        PlayableItem::new(title, format!("https://www.youtube.com/watch?v={title}"))
    }

    fn drain(queue: &mut SongQueue) -> Vec<String> {
        std::iter::from_fn(|| queue.pop_front().ok())
            .map(|item| item.title().to_string())
            .collect()
    }

    #[test]
    fn pops_in_insertion_order_with_pushes_ahead() {
        let mut queue = SongQueue::new(10);
        queue.enqueue(song("a")).unwrap();
        queue.enqueue(song("b")).unwrap();
        queue.push(song("c")).unwrap();
        queue.enqueue(song("d")).unwrap();
        queue.push(song("e")).unwrap();

        assert_eq!(drain(&mut queue), vec!["e", "c", "a", "b", "d"]);
    }

    #[test]
    fn interleaved_operations_never_duplicate_keys() {
        let mut queue = SongQueue::new(100);
        let mut popped = Vec::new();

        for round in 0..20 {
            let key = format!("song-{}", round % 7);
            let item = song(&key);
            let result = if round % 3 == 0 {
                queue.push(item)
            } else {
                queue.enqueue(item)
            };
            if let Err(err) = result {
                assert_eq!(err, PlayerError::DuplicateKey(key.clone()));
                assert!(queue.contains(&ItemKey::new(&key)));
            }
            if round % 4 == 3 {
                popped.push(queue.pop_front().unwrap().title().to_string());
            }

            let upcoming = queue.peek_upcoming(usize::MAX);
            let unique: HashSet<&String> = upcoming.iter().collect();
            assert_eq!(unique.len(), upcoming.len());
        }
        assert_eq!(popped.len(), 5);
    }

    #[test]
    fn duplicate_key_is_accepted_again_after_removal() {
        let mut queue = SongQueue::new(10);
        queue.enqueue(song("A")).unwrap();

        assert_eq!(
            queue.enqueue(song("A")),
            Err(PlayerError::DuplicateKey("A".into()))
        );
        assert_eq!(queue.push(song("A")), Err(PlayerError::DuplicateKey("A".into())));

        let removed = queue.remove(&ItemKey::from("A")).unwrap();
        assert_eq!(removed.title(), "A");
        assert!(queue.enqueue(song("A")).is_ok());
    }

    #[test]
    fn pop_and_remove_on_missing_items() {
        let mut queue = SongQueue::new(10);
        assert_eq!(queue.pop_front(), Err(PlayerError::EmptyQueue));
        assert_eq!(
            queue.remove(&ItemKey::from("ghost")),
            Err(PlayerError::NotFound("ghost".into()))
        );
    }

    #[test]
    fn peek_upcoming_appends_marker_when_truncated() {
        let mut queue = SongQueue::new(10);
        for title in ["a", "b", "c"] {
            queue.enqueue(song(title)).unwrap();
        }

        assert_eq!(queue.peek_upcoming(3), vec!["a", "b", "c"]);
        assert_eq!(queue.peek_upcoming(2), vec!["a", "b", TRUNCATION_MARKER]);
        assert_eq!(queue.peek_upcoming(0), vec![TRUNCATION_MARKER]);
        assert!(SongQueue::new(1).peek_upcoming(5).is_empty());
    }

    #[test]
    fn insert_after_keeps_relative_order() {
        let mut queue = SongQueue::new(10);
        queue.enqueue(song("old")).unwrap();
        queue.push(song("p1")).unwrap();
        queue.insert_after(&ItemKey::from("p1"), song("p2")).unwrap();
        queue.insert_after(&ItemKey::from("p2"), song("p3")).unwrap();

        assert_eq!(queue.peek_upcoming(10), vec!["p1", "p2", "p3", "old"]);

        // sin ancla: vuelve al frente
        queue.pop_front().unwrap();
        queue.remove(&ItemKey::from("p2")).unwrap();
        queue.insert_after(&ItemKey::from("p2"), song("p4")).unwrap();
        assert_eq!(queue.peek_upcoming(10), vec!["p4", "p3", "old"]);
    }

    #[test]
    fn rejects_items_beyond_capacity() {
        let mut queue = SongQueue::new(2);
        queue.enqueue(song("a")).unwrap();
        queue.enqueue(song("b")).unwrap();

        assert_eq!(queue.enqueue(song("c")), Err(PlayerError::QueueFull(2)));
        assert!(!queue.contains(&ItemKey::from("c")));
        assert_eq!(queue.clear(), 2);
        assert!(queue.is_empty());
    }
}
