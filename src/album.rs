//! Session-scoped album cache.
//!
//! An album is created the first time a resolve yields several items and is
//! keyed by the canonical request URL. Hovering the same album later reuses
//! the cached items together with their stored cursor. Albums are never
//! dropped during a session.
//!
//! The cursor is 1-based and always within `1..=len`.

use std::collections::HashMap;

use regex::RegexBuilder;

/// One album entry: its candidate URLs (best first) and optional caption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlbumItem {
    pub urls: Vec<String>,
    pub caption: Option<String>,
}

impl AlbumItem {
    pub fn new(url: impl Into<String>, caption: Option<String>) -> Self {
        AlbumItem { urls: vec![url.into()], caption }
    }

    pub fn url(&self) -> Option<&str> {
        self.urls.first().map(String::as_str)
    }
}

/// A navigation command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlbumNav {
    /// Relative move from the cursor.
    Step(i64),
    /// 1-based index; `0` means the first item.
    Absolute(i64),
    First,
    Last,
    /// Case-insensitive regex over captions, searched forward from the cursor
    /// and wrapping around.
    Search(String),
}

impl AlbumNav {
    /// Parses the textual forms used by key handlers and the host:
    /// `"+2"`/`"-1"` (relative), `"4"` (absolute), anything else a search.
    pub fn parse(input: &str) -> Option<AlbumNav> {
        let input = input.trim();
        if input.is_empty() {
            return None;
        }
        if regex!(r"^[+-]?\d+$").is_match(input) {
            let n: i64 = input.parse().ok()?;
            return Some(if input.starts_with(['+', '-']) { AlbumNav::Step(n) } else { AlbumNav::Absolute(n) });
        }
        Some(AlbumNav::Search(input.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Album {
    items: Vec<AlbumItem>,
    cursor: usize,
    /// The album was already recorded in the navigation history.
    pub in_history: bool,
}

impl Album {
    /// Creates an album positioned at `start`, clamped into range.
    ///
    /// Returns `None` for an empty item list.
    pub fn new(items: Vec<AlbumItem>, start: usize) -> Option<Album> {
        if items.is_empty() {
            return None;
        }
        let cursor = start.clamp(1, items.len());
        Some(Album { items, cursor, in_history: false })
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn items(&self) -> &[AlbumItem] {
        &self.items
    }

    /// 1-based lookup.
    pub fn item(&self, index: usize) -> Option<&AlbumItem> {
        index.checked_sub(1).and_then(|i| self.items.get(i))
    }

    pub fn current(&self) -> &AlbumItem {
        &self.items[self.cursor - 1]
    }

    /// `"3 / 12"`.
    pub fn counter(&self) -> String {
        format!("{} / {}", self.cursor, self.items.len())
    }

    /// Works out the index `nav` leads to, without moving.
    ///
    /// `None` when a search finds nothing or its pattern is invalid.
    pub fn target(&self, nav: &AlbumNav, cyclic: bool) -> Option<usize> {
        let n = self.items.len() as i64;
        let raw = match nav {
            AlbumNav::Step(step) => (self.cursor as i64).saturating_add(*step),
            AlbumNav::Absolute(0) | AlbumNav::First => 1,
            AlbumNav::Absolute(i) => *i,
            AlbumNav::Last => n,
            AlbumNav::Search(pattern) => return self.search(pattern),
        };
        let idx = if cyclic {
            match raw.rem_euclid(n) {
                0 => n,
                wrapped => wrapped,
            }
        } else {
            raw.clamp(1, n)
        };
        Some(idx as usize)
    }

    fn search(&self, pattern: &str) -> Option<usize> {
        let re = match RegexBuilder::new(pattern.trim()).case_insensitive(true).build() {
            Ok(re) => re,
            Err(err) => {
                tracing::debug!(pattern, %err, "album search pattern rejected");
                return None;
            }
        };
        let n = self.items.len();
        (1..n)
            .map(|offset| (self.cursor - 1 + offset) % n + 1)
            .find(|&i| self.item(i).and_then(|it| it.caption.as_deref()).is_some_and(|c| re.is_match(c)))
    }

    /// Moves the cursor. Returns the previous cursor when it changed.
    pub fn navigate(&mut self, nav: &AlbumNav, cyclic: bool) -> Option<usize> {
        let target = self.target(nav, cyclic)?;
        if target == self.cursor {
            return None;
        }
        let previous = self.cursor;
        self.cursor = target;
        Some(previous)
    }

    /// Items worth preloading after a move from `previous` to the cursor,
    /// continuing in the direction of travel.
    pub fn neighbours(&self, previous: usize, count: usize) -> Vec<usize> {
        let n = self.items.len();
        let (cur, prev) = (self.cursor, previous);
        let forward = (prev <= cur && !(prev == 1 && cur == n)) || (prev == n && cur == 1);
        (1..=count)
            .map_while(|i| if forward { Some(cur + i) } else { cur.checked_sub(i) })
            .take_while(|&i| i >= 1 && i <= n)
            .collect()
    }
}

/// All albums seen during the session.
#[derive(Debug, Clone, Default)]
pub struct AlbumStore {
    albums: HashMap<String, Album>,
}

impl AlbumStore {
    pub fn new() -> Self {
        AlbumStore::default()
    }

    /// Returns the album cached under `key`, creating it from `items` on first
    /// access. A cached album keeps its own cursor.
    pub fn open(&mut self, key: &str, items: Vec<AlbumItem>, start: usize) -> Option<&mut Album> {
        if !self.albums.contains_key(key) {
            let album = Album::new(items, start)?;
            tracing::debug!(key, items = album.len(), cursor = album.cursor(), "album created");
            self.albums.insert(key.to_string(), album);
        }
        self.albums.get_mut(key)
    }

    pub fn get(&self, key: &str) -> Option<&Album> {
        self.albums.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Album> {
        self.albums.get_mut(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.albums.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.albums.len()
    }

    pub fn is_empty(&self) -> bool {
        self.albums.is_empty()
    }

    pub fn clear(&mut self) {
        self.albums.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(captions: &[&str]) -> Vec<AlbumItem> {
        captions.iter().enumerate().map(|(i, c)| AlbumItem::new(format!("{i}.jpg"), Some(c.to_string()))).collect()
    }

    #[test]
    fn two_item_album_clamps_without_wrap() {
        let mut store = AlbumStore::new();
        let album = store
            .open("x.com/a", vec![AlbumItem::new("a.jpg", Some("cap1".into())), AlbumItem::new("b.jpg", Some("cap2".into()))], 1)
            .unwrap();
        assert_eq!(1, album.cursor());

        assert_eq!(Some(1), album.navigate(&AlbumNav::Step(1), false));
        assert_eq!(2, album.cursor());
        assert_eq!(None, album.navigate(&AlbumNav::Step(1), false));
        assert_eq!(2, album.cursor());
        assert_eq!("b.jpg", album.current().urls[0]);
    }

    #[test]
    fn cached_album_keeps_its_cursor() {
        let mut store = AlbumStore::new();
        store.open("k", items(&["a", "b", "c"]), 1).unwrap().navigate(&AlbumNav::Last, false);
        let again = store.open("k", items(&["other"]), 1).unwrap();
        assert_eq!(3, again.len());
        assert_eq!(3, again.cursor());
    }

    #[test]
    fn cyclic_round_trip() {
        for n in 1..6 {
            let captions: Vec<String> = (0..n).map(|i| i.to_string()).collect();
            let captions: Vec<&str> = captions.iter().map(String::as_str).collect();
            for start in 1..=n {
                let mut album = Album::new(items(&captions), start).unwrap();
                for _ in 0..n {
                    album.navigate(&AlbumNav::Step(1), true);
                    assert!((1..=n).contains(&album.cursor()));
                }
                assert_eq!(start, album.cursor(), "n={n} start={start}");
            }
        }
    }

    #[test]
    fn targets() {
        let album = Album::new(items(&["a", "b", "c", "d"]), 2).unwrap();
        let cases = vec![
            (Some(3), AlbumNav::Step(1), false),
            (Some(1), AlbumNav::Step(-5), false),
            (Some(1), AlbumNav::Step(-1), true),
            (Some(4), AlbumNav::Step(-2), true),
            (Some(2), AlbumNav::Step(4), true),
            (Some(4), AlbumNav::Step(i64::MAX), false),
            (Some(3), AlbumNav::Step(i64::MAX), true),
            (Some(1), AlbumNav::Step(i64::MIN), false),
            (Some(4), AlbumNav::Absolute(9), false),
            (Some(1), AlbumNav::Absolute(5), true),
            (Some(1), AlbumNav::Absolute(0), false),
            (Some(1), AlbumNav::First, true),
            (Some(4), AlbumNav::Last, true),
            (Some(4), AlbumNav::Search("^D$".into()), false),
            (Some(1), AlbumNav::Search("a".into()), false),
            (None, AlbumNav::Search("zzz".into()), false),
            (None, AlbumNav::Search("(".into()), false),
        ];
        for (expected, nav, cyclic) in cases {
            assert_eq!(expected, album.target(&nav, cyclic), "{nav:?} cyclic={cyclic}");
        }
    }

    #[test]
    fn parse_navigation() {
        let cases = vec![
            (Some(AlbumNav::Step(1)), "+1"),
            (Some(AlbumNav::Step(-5)), "-5"),
            (Some(AlbumNav::Step(i64::MAX)), "+9223372036854775807"),
            (Some(AlbumNav::Absolute(3)), "3"),
            (Some(AlbumNav::Search("cat".into())), " cat "),
            (None, "  "),
        ];
        for (expected, input) in cases {
            assert_eq!(expected, AlbumNav::parse(input), "input: {input:?}");
        }
    }

    #[test]
    fn neighbours_follow_direction_of_travel() {
        let mut album = Album::new(items(&["a", "b", "c", "d", "e"]), 2).unwrap();
        let prev = album.navigate(&AlbumNav::Step(1), false).unwrap();
        assert_eq!(vec![4], album.neighbours(prev, 1));
        assert_eq!(vec![4, 5], album.neighbours(prev, 3));

        let prev = album.navigate(&AlbumNav::Step(-1), false).unwrap();
        assert_eq!(vec![1], album.neighbours(prev, 3));
    }
}
