// Content catalog - the static library of stories and songs
// In a bigger build this would come from a database or a sync service;
// for now it ships with the app, same as the cover art URLs it points at.

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Closed discriminator for everything the player can load.
/// Carried explicitly through snapshots, favorites and catalog lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Story,
    Song,
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentType::Story => write!(f, "story"),
            ContentType::Song => write!(f, "song"),
        }
    }
}

/// A single playable item. Never mutated by the session manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub category: String,
    pub content_type: ContentType,
    pub audio_url: String,
    pub cover_url: String,
    pub duration_secs: u32,
    /// Suggested listener age band, stories only (e.g. "3-6").
    pub age_range: Option<String>,
    pub has_lyrics: bool,
    pub lyrics_url: Option<String>,
    pub is_downloaded: bool,
    pub local_path: Option<PathBuf>,
}

impl Track {
    pub fn duration_ms(&self) -> u64 {
        u64::from(self.duration_secs) * 1000
    }
}

pub struct Catalog {
    tracks: Vec<Track>,
}

impl Catalog {
    pub fn with_tracks(tracks: Vec<Track>) -> Self {
        Self { tracks }
    }

    /// The bundled library: ten stories, ten songs.
    pub fn builtin() -> Self {
        Self {
            tracks: builtin_tracks(),
        }
    }

    pub fn get(&self, content_type: ContentType, id: i64) -> Option<&Track> {
        self.tracks
            .iter()
            .find(|t| t.content_type == content_type && t.id == id)
    }

    pub fn all(&self, content_type: ContentType) -> Vec<&Track> {
        self.tracks
            .iter()
            .filter(|t| t.content_type == content_type)
            .collect()
    }

    pub fn by_category(&self, content_type: ContentType, category: &str) -> Vec<&Track> {
        self.tracks
            .iter()
            .filter(|t| t.content_type == content_type && t.category == category)
            .collect()
    }

    /// A random sample of up to five tracks for the home screen.
    /// Order is intentionally non-deterministic.
    pub fn recommended(&self, content_type: ContentType) -> Vec<&Track> {
        let mut rng = rand::thread_rng();
        self.all(content_type)
            .choose_multiple(&mut rng, 5)
            .copied()
            .collect()
    }
}

fn story(
    id: i64,
    title: &str,
    description: &str,
    category: &str,
    slug: &str,
    duration_secs: u32,
    age_range: &str,
) -> Track {
    Track {
        id,
        title: title.to_string(),
        description: description.to_string(),
        category: category.to_string(),
        content_type: ContentType::Story,
        audio_url: format!("https://cdn.lullabox.app/stories/{slug}.mp3"),
        cover_url: format!("https://cdn.lullabox.app/covers/{slug}.jpg"),
        duration_secs,
        age_range: Some(age_range.to_string()),
        has_lyrics: false,
        lyrics_url: None,
        is_downloaded: false,
        local_path: None,
    }
}

fn song(
    id: i64,
    title: &str,
    description: &str,
    category: &str,
    slug: &str,
    duration_secs: u32,
    has_lyrics: bool,
) -> Track {
    Track {
        id,
        title: title.to_string(),
        description: description.to_string(),
        category: category.to_string(),
        content_type: ContentType::Song,
        audio_url: format!("https://cdn.lullabox.app/songs/{slug}.mp3"),
        cover_url: format!("https://cdn.lullabox.app/covers/{slug}.jpg"),
        duration_secs,
        age_range: None,
        has_lyrics,
        lyrics_url: has_lyrics.then(|| format!("https://cdn.lullabox.app/lyrics/{slug}.lrc")),
        is_downloaded: false,
        local_path: None,
    }
}

fn builtin_tracks() -> Vec<Track> {
    vec![
        story(1, "Little Red Riding Hood", "A classic fairy tale", "Fairy Tales", "little_red_riding_hood", 300, "3-6"),
        story(2, "The Three Little Pigs", "Hard-working little pigs", "Fairy Tales", "three_little_pigs", 240, "3-6"),
        story(3, "Snow White", "The fairest princess of all", "Fairy Tales", "snow_white", 360, "3-6"),
        story(4, "The Tortoise and the Hare", "Slow and steady wins the race", "Fables", "tortoise_and_hare", 180, "3-6"),
        story(5, "The Pony Crosses the River", "A story about trying for yourself", "Fables", "pony_crosses_river", 210, "3-6"),
        story(6, "The Boy Who Cried Wolf", "Why honesty matters", "Fables", "boy_who_cried_wolf", 240, "3-6"),
        story(7, "The Moon's Secret", "A gentle introduction to the moon", "Science", "moon_secret", 270, "6-9"),
        story(8, "World of Dinosaurs", "How the dinosaurs lived", "Science", "dinosaur_world", 300, "6-9"),
        story(9, "The Bear's Dream", "A warm story for drifting off", "Bedtime", "bear_dream", 240, "0-3"),
        story(10, "Journey of a Star", "A warm story for drifting off", "Bedtime", "star_journey", 210, "0-3"),
        song(1, "Two Tigers", "A nursery classic", "Classics", "two_tigers", 120, true),
        song(2, "Little Star", "A nursery classic", "Classics", "little_star", 90, true),
        song(3, "The Little Donkey", "A nursery classic", "Classics", "little_donkey", 150, true),
        song(4, "Counting Ducks", "A nursery classic", "Classics", "counting_ducks", 135, true),
        song(5, "Twinkle Twinkle Little Star", "English nursery rhyme", "English Rhymes", "twinkle_twinkle", 105, true),
        song(6, "Old MacDonald Had a Farm", "English nursery rhyme", "English Rhymes", "old_macdonald", 180, true),
        song(7, "Lullaby", "For helping little ones sleep", "Lullabies", "lullaby", 240, false),
        song(8, "Mother Is the Best", "A song of thanks", "Holidays", "mother_is_the_best", 210, true),
        song(9, "Happy New Year", "A celebration song", "Holidays", "happy_new_year", 120, true),
        song(10, "Finding Friends", "A sing-along game", "Rhymes", "finding_friends", 150, true),
    ]
}
