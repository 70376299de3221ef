use parking_lot::Mutex;
use rand::seq::SliceRandom;
use std::{collections::VecDeque, time::Duration};
use tokio::sync::{futures::Notified, Notify};
use tracing::{debug, info};

use super::song::Song;
use crate::error::{MusicError, MusicResult};

/// FIFO song queue shared between command handlers and the play loop.
///
/// Every operation takes the internal lock once, so a `dequeue_front` from the
/// loop can never interleave with a `remove_at`, `shuffle` or `clear` issued by
/// a command.
#[derive(Debug, Default)]
pub struct SongQueue {
    items: Mutex<VecDeque<Song>>,
    available: Notify,
}

impl SongQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a song and wakes the play loop if it is waiting for one.
    pub fn enqueue(&self, song: Song) {
        info!("➕ Queued: {}", song.title());
        self.items.lock().push_back(song);
        self.available.notify_one();
    }

    /// Puts a song back at the head of the queue (loop mode replay).
    pub fn push_front(&self, song: Song) {
        debug!("🔂 Requeued at front: {}", song.title());
        self.items.lock().push_front(song);
        self.available.notify_one();
    }

    pub fn dequeue_front(&self) -> Option<Song> {
        self.items.lock().pop_front()
    }

    /// Resolves on the next enqueue. Create it before checking the queue so
    /// a concurrent enqueue is not missed.
    pub(crate) fn notified(&self) -> Notified<'_> {
        self.available.notified()
    }

    /// Waits until a song is available and takes it.
    pub async fn next(&self) -> Song {
        loop {
            let notified = self.available.notified();
            if let Some(song) = self.dequeue_front() {
                return song;
            }
            notified.await;
        }
    }

    /// Removes the song at a 1-based position.
    pub fn remove_at(&self, index: usize) -> MusicResult<Song> {
        let mut items = self.items.lock();
        let len = items.len();
        if index == 0 || index > len {
            return Err(MusicError::OutOfRange { index, len });
        }

        let removed = items
            .remove(index - 1)
            .ok_or(MusicError::OutOfRange { index, len })?;
        debug!("❌ Removed position {}: {}", index, removed.title());
        Ok(removed)
    }

    pub fn shuffle(&self) {
        let mut items = self.items.lock();
        let mut rng = rand::thread_rng();
        items.make_contiguous().shuffle(&mut rng);
        info!("🔀 Queue shuffled ({} songs)", items.len());
    }

    /// Drops every queued song and returns how many were removed.
    pub fn clear(&self) -> usize {
        let mut items = self.items.lock();
        let cleared = items.len();
        items.clear();
        info!("🗑️ Queue cleared: {} songs removed", cleared);
        cleared
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    /// Sum of known durations; live streams count as zero.
    pub fn total_duration(&self) -> Duration {
        self.items.lock().iter().filter_map(Song::duration).sum()
    }

    /// Read-only view of one page of the queue. Pages are 1-based.
    pub fn snapshot(&self, page: usize, page_size: usize) -> QueuePage {
        let items = self.items.lock();
        let page_size = page_size.max(1);
        let page = page.max(1);
        let total_items = items.len();
        let total_pages = total_items.div_ceil(page_size).max(1);
        let start = (page - 1).saturating_mul(page_size);

        QueuePage {
            items: items.iter().skip(start).take(page_size).cloned().collect(),
            first_position: start + 1,
            page,
            total_pages,
            total_items,
        }
    }
}

#[derive(Debug, Clone)]
pub struct QueuePage {
    pub items: Vec<Song>,
    /// 1-based queue position of `items[0]`.
    pub first_position: usize,
    pub page: usize,
    pub total_pages: usize,
    pub total_items: usize,
}

impl QueuePage {
    /// Items paired with their 1-based queue positions.
    pub fn numbered(&self) -> impl Iterator<Item = (usize, &Song)> {
        self.items
            .iter()
            .enumerate()
            .map(move |(offset, song)| (self.first_position + offset, song))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::song::AudioHandle;
    use pretty_assertions::assert_eq;
    use serenity::model::id::UserId;
    use std::sync::Arc;

    fn song(title: &str) -> Song {
        let url = format!("https://youtu.be/{title}");
        Song::new(AudioHandle::Ytdl(url.clone()), title, url, UserId::new(1))
    }

    fn titles(queue: &SongQueue) -> Vec<String> {
        queue.snapshot(1, usize::MAX).items.iter().map(|s| s.title().to_string()).collect()
    }

    #[test]
    fn dequeues_in_insertion_order() {
        let queue = SongQueue::new();
        for title in ["S1", "S2", "S3"] {
            queue.enqueue(song(title));
        }

        assert_eq!(queue.dequeue_front().map(|s| s.title().to_string()), Some("S1".into()));
        assert_eq!(queue.dequeue_front().map(|s| s.title().to_string()), Some("S2".into()));
        assert_eq!(queue.dequeue_front().map(|s| s.title().to_string()), Some("S3".into()));
        assert!(queue.dequeue_front().is_none());
    }

    #[test]
    fn remove_at_is_one_based() {
        let queue = SongQueue::new();
        for title in ["a", "b", "c"] {
            queue.enqueue(song(title));
        }

        let removed = queue.remove_at(2).unwrap();
        assert_eq!(removed.title(), "b");
        assert_eq!(titles(&queue), vec!["a", "c"]);
    }

    #[test]
    fn remove_at_out_of_range_leaves_queue_untouched() {
        let queue = SongQueue::new();
        for title in ["a", "b", "c"] {
            queue.enqueue(song(title));
        }

        assert_eq!(queue.remove_at(5).unwrap_err(), MusicError::OutOfRange { index: 5, len: 3 });
        assert_eq!(queue.remove_at(0).unwrap_err(), MusicError::OutOfRange { index: 0, len: 3 });
        assert_eq!(queue.len(), 3);
        assert_eq!(titles(&queue), vec!["a", "b", "c"]);
    }

    #[test]
    fn clear_empties_the_queue() {
        let queue = SongQueue::new();
        queue.enqueue(song("a"));
        queue.enqueue(song("b"));

        assert_eq!(queue.clear(), 2);
        assert_eq!(queue.len(), 0);
        assert!(queue.dequeue_front().is_none());
    }

    #[test]
    fn shuffle_keeps_every_song() {
        let queue = SongQueue::new();
        for i in 0..20 {
            queue.enqueue(song(&format!("s{i}")));
        }
        queue.shuffle();

        let mut after = titles(&queue);
        after.sort();
        let mut expected: Vec<String> = (0..20).map(|i| format!("s{i}")).collect();
        expected.sort();
        assert_eq!(after, expected);

        let empty = SongQueue::new();
        empty.shuffle();
        assert!(empty.is_empty());
    }

    #[test]
    fn push_front_jumps_the_line() {
        let queue = SongQueue::new();
        queue.enqueue(song("next"));
        queue.push_front(song("again"));
        assert_eq!(titles(&queue), vec!["again", "next"]);
    }

    #[test]
    fn snapshot_paginates_and_tolerates_out_of_range_pages() {
        let queue = SongQueue::new();
        for i in 1..=23 {
            queue.enqueue(song(&format!("s{i}")));
        }

        let page = queue.snapshot(3, 10);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.total_items, 23);
        let numbered: Vec<(usize, String)> = page.numbered().map(|(n, s)| (n, s.title().to_string())).collect();
        assert_eq!(
            numbered,
            vec![(21, "s21".to_string()), (22, "s22".to_string()), (23, "s23".to_string())]
        );

        let beyond = queue.snapshot(9, 10);
        assert!(beyond.items.is_empty());
        assert_eq!(beyond.page, 9);
    }

    #[test]
    fn total_duration_skips_unknown_lengths() {
        let queue = SongQueue::new();
        queue.enqueue(song("a").with_duration(Duration::from_secs(60)));
        queue.enqueue(song("live"));
        queue.enqueue(song("b").with_duration(Duration::from_secs(30)));
        assert_eq!(queue.total_duration(), Duration::from_secs(90));
    }

    #[tokio::test]
    async fn next_waits_for_an_enqueue() {
        let queue = Arc::new(SongQueue::new());
        let waiter = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.next().await })
        };

        tokio::task::yield_now().await;
        queue.enqueue(song("late"));

        let got = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("next() should wake up")
            .unwrap();
        assert_eq!(got.title(), "late");
    }

    #[tokio::test]
    async fn concurrent_producers_lose_nothing() {
        let queue = Arc::new(SongQueue::new());
        let mut producers = Vec::new();
        for p in 0..4 {
            let queue = queue.clone();
            producers.push(tokio::spawn(async move {
                for i in 0..25 {
                    queue.enqueue(song(&format!("p{p}-{i}")));
                    tokio::task::yield_now().await;
                }
            }));
        }
        for producer in producers {
            producer.await.unwrap();
        }

        let mut seen = std::collections::HashSet::new();
        while let Some(song) = queue.dequeue_front() {
            assert!(seen.insert(song.title().to_string()));
        }
        assert_eq!(seen.len(), 100);
    }
}
