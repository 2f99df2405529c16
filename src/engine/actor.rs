//! Roaming customers and their profiles.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::api::RemoteProfile;
use crate::world::Position;

pub const PROFILE_SCHEMA_VERSION: u8 = 1;

/// Narrative status tag carried by a customer profile.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CustomerStatus {
    Alive,
    Dead,
    Cursed,
    Burned,
    Unknown,
}

impl CustomerStatus {
    /// Parse a remote status string; anything unrecognized is `Unknown`.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "alive" => CustomerStatus::Alive,
            "dead" => CustomerStatus::Dead,
            "cursed" => CustomerStatus::Cursed,
            "burned" => CustomerStatus::Burned,
            _ => CustomerStatus::Unknown,
        }
    }
}

/// Rich profile behind a roaming customer. Remote profile fields are merged
/// in when available; anything missing gets a randomized or neutral default.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CustomerProfile {
    pub id: u32,
    pub name: String,
    pub age: u32,
    pub money: i64,
    pub status: CustomerStatus,
    pub icon_url: Option<String>,
    /// Up to three fallback portrait URLs tried in order.
    #[serde(default)]
    pub icon_fallbacks: Vec<String>,
    #[serde(default)]
    pub bio: String,
    #[serde(default = "default_level")]
    pub level: u32,
    pub schema_version: u8,
}

fn default_level() -> u32 {
    1
}

impl CustomerProfile {
    pub fn new(id: u32, name: &str, age: u32, money: i64, bio: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            age,
            money,
            status: CustomerStatus::Alive,
            icon_url: None,
            icon_fallbacks: Vec::new(),
            bio: bio.to_string(),
            level: default_level(),
            schema_version: PROFILE_SCHEMA_VERSION,
        }
    }

    /// Overlay a remote candidate record. Fields the record omits get
    /// randomized or neutral defaults; an unparseable status degrades to
    /// `Unknown`. Partial records are never rejected.
    pub fn merge_remote<R: Rng>(&mut self, remote: &RemoteProfile, rng: &mut R) {
        if !remote.name.trim().is_empty() {
            self.name = remote.name.trim().to_string();
        }
        self.age = remote.age.unwrap_or_else(|| rng.gen_range(18..70));
        self.money = remote.money.unwrap_or_else(|| rng.gen_range(500..5000));
        if let Some(ref status) = remote.status {
            self.status = CustomerStatus::parse(status);
        }
        if let Some(ref urls) = remote.icon_urls {
            self.icon_url = Some(urls.primary.clone());
            self.icon_fallbacks = [&urls.fallback1, &urls.fallback2, &urls.fallback3]
                .iter()
                .filter_map(|u| u.as_ref().cloned())
                .collect();
        } else if let Some(ref url) = remote.icon_url {
            self.icon_url = Some(url.clone());
        }
        if let Some(ref bio) = remote.profile {
            self.bio = bio.clone();
        }
        if let Some(level) = remote.level {
            self.level = level;
        }
    }
}

/// A roaming customer: stable id, mutable position, attention flag.
#[derive(Debug, Clone, PartialEq)]
pub struct Customer {
    pub id: u32,
    pub position: Position,
    pub glyph: String,
    /// True while this customer is seeking player attention next to a machine.
    pub calling: bool,
    pub profile: CustomerProfile,
}

impl Customer {
    pub fn new(profile: CustomerProfile, position: Position) -> Self {
        Self {
            id: profile.id,
            position,
            glyph: "P".to_string(),
            calling: false,
            profile,
        }
    }
}

/// Built-in roster of customer profiles, used by the spawn controller when
/// the remote collaborator has nothing fresher to offer.
pub fn default_roster() -> Vec<CustomerProfile> {
    vec![
        CustomerProfile::new(100, "ユウタ", 24, 3200, "毎週金曜に来る常連。クレーンゲームに人生を賭けている。"),
        CustomerProfile::new(101, "ミカ", 19, 1500, "音ゲーの全国ランカー。指のストレッチを欠かさない。"),
        CustomerProfile::new(102, "ケンジ", 35, 5200, "レトロゲーム収集家。昔話が長い。"),
        CustomerProfile::new(103, "アオイ", 22, 800, "プリクラ機の前でいつも悩んでいる。"),
        CustomerProfile::new(104, "タカシ", 41, 12000, "両替機を疑っている。小銭の数を必ず数える。"),
        CustomerProfile::new(105, "サクラ", 17, 600, "初めて来た高校生。何から遊べばいいか分からない。"),
    ]
}
