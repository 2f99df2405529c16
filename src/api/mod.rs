//! Client for the remote NPC-response collaborator.
//!
//! The backend is an opaque REST service: it produces customer profiles,
//! conversational replies, and "magic spell" effect descriptions. Every
//! operation here degrades to a scripted local fallback; a network failure is
//! never surfaced to the player as an error.
//!
//! Spell responses arrive in an ad hoc shape (sometimes a structured effect,
//! sometimes freeform text). They are classified into [`SpellEffect`] at this
//! boundary so the dialogue state machine never performs speculative parsing.

use log::{debug, warn};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tokio::time::timeout;

use crate::config::ApiConfig;

/// Transport-level failure reaching the collaborator. A "not found" answer is
/// NOT an error; see [`SpellLookup::NotFound`].
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request timeout after {0}s")]
    Timeout(u32),

    #[error("http request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("api returned status {0}")]
    Status(u16),

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("api disabled")]
    Disabled,
}

/// Effect of a looked-up spell, classified at the boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum SpellEffect {
    /// The addressed customer does not survive.
    Lethal,
    /// The customer shrugs it off; no state change.
    Survived,
    /// The customer is status-tagged cursed.
    Cursed,
    /// Money changes hands; positive credits the customer.
    Monetary(i64),
    /// Freeform narration with no mechanical consequence.
    Generic(String),
}

/// Result of a spell lookup: found (with classified effect) or an explicit
/// negative answer. Distinguished from transport errors by the `Result` layer.
#[derive(Debug, Clone, PartialEq)]
pub enum SpellLookup {
    Found(SpellEffect),
    NotFound,
}

/// Candidate-profile record as returned by the collaborator. Every field
/// beyond the name is optional; the engine substitutes defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteProfile {
    pub name: String,
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub money: Option<i64>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub icon_url: Option<String>,
    #[serde(default)]
    pub icon_urls: Option<IconUrls>,
    #[serde(default)]
    pub profile: Option<String>,
    #[serde(default)]
    pub level: Option<u32>,
}

/// Portrait URL plus up to three fallbacks.
#[derive(Debug, Clone, Deserialize)]
pub struct IconUrls {
    pub primary: String,
    #[serde(default)]
    pub fallback1: Option<String>,
    #[serde(default)]
    pub fallback2: Option<String>,
    #[serde(default)]
    pub fallback3: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ReplyBody {
    Lines { lines: Vec<String> },
    Single { reply: String },
}

impl ReplyBody {
    fn into_lines(self) -> Vec<String> {
        match self {
            ReplyBody::Lines { lines } => lines,
            ReplyBody::Single { reply } => vec![reply],
        }
    }
}

/// Scripted opening lines used when the collaborator cannot be reached,
/// keyed by the glyph of the machine the customer is standing next to.
const OPENING_FALLBACKS: [(&str, &str); 9] = [
    ("👾", "このレースゲーム、ハンドルが全然きかないんだけど！"),
    ("🚀", "シューティングで詰まっちゃって…攻略のコツ、知らない？"),
    ("🧸", "クレーンゲームのアルパカ、あと少しで取れそうなのに！"),
    ("🎵", "この曲の譜面、難しすぎない？腕が痛いよ。"),
    ("🕹️", "レトロゲームって最高だよね。ちょっと見ててよ。"),
    ("💰", "両替機が千円札を飲み込んだまま黙っちゃった…"),
    ("📸", "プリクラ撮りたいんだけど、使い方がわからなくて。"),
    ("🥤", "自販機のボタン、押しても何も出てこないんだ。"),
    ("ℹ️", "すみません、店員さんはどこにいるの？"),
];

/// Generic reply when the collaborator fails mid-conversation.
const RELAY_FALLBACK: &str = "…（通信が途切れたようだ）";

/// Parting line used when the ban notice cannot be delivered.
const FAREWELL_FALLBACK: &str = "……わかったよ。もう来ないよ。";

/// Opening line fallback for a customer with no machine context.
const OPENING_FALLBACK_GENERIC: &str = "ねえねえ、ちょっと聞いてよ！";

/// Scripted opening lines for an unreachable collaborator, keyed by machine
/// glyph with a generic line for unknown context.
pub fn opening_fallback(machine_glyph: Option<&str>) -> String {
    machine_glyph
        .and_then(|g| {
            OPENING_FALLBACKS
                .iter()
                .find(|(glyph, _)| *glyph == g)
                .map(|(_, line)| line.to_string())
        })
        .unwrap_or_else(|| OPENING_FALLBACK_GENERIC.to_string())
}

pub fn relay_fallback() -> String {
    RELAY_FALLBACK.to_string()
}

pub fn farewell_fallback() -> String {
    FAREWELL_FALLBACK.to_string()
}

/// HTTP client for the NPC-response service.
pub struct NpcChatClient {
    config: ApiConfig,
    client: reqwest::Client,
}

impl NpcChatClient {
    pub fn new(config: ApiConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled && !self.config.base_url.is_empty()
    }

    fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_seconds as u64)
    }

    /// Fetch one candidate profile. `Ok(None)` is the explicit "none
    /// available" signal; transport failures also degrade to `None` after a
    /// warn log, because spawning must not block on the network.
    pub async fn fetch_candidate_profile(&self) -> Option<RemoteProfile> {
        if !self.is_enabled() {
            debug!("api disabled; spawn uses roster profile only");
            return None;
        }
        let url = format!("{}/customers/candidate", self.config.base_url);
        match self.get_json::<RemoteProfile>(&url).await {
            Ok(profile) => Some(profile),
            Err(ApiError::Status(404)) => {
                debug!("no candidate profile available");
                None
            }
            Err(e) => {
                warn!("candidate profile fetch failed: {}", e);
                None
            }
        }
    }

    /// Ask for the customer's opening line: what they want, phrased against
    /// the machine they are standing next to.
    pub async fn opening_line(
        &self,
        customer_id: u32,
        customer_name: &str,
        machine_glyph: Option<&str>,
    ) -> Result<Vec<String>, ApiError> {
        if !self.is_enabled() {
            return Err(ApiError::Disabled);
        }
        let url = format!("{}/npc/opening", self.config.base_url);
        let body = serde_json::json!({
            "customer_id": customer_id,
            "name": customer_name,
            "machine": machine_glyph,
        });
        self.post_reply(&url, &body).await
    }

    /// Relay raw player text to the addressed customer.
    pub async fn relay_message(
        &self,
        customer_id: u32,
        text: &str,
    ) -> Result<Vec<String>, ApiError> {
        if !self.is_enabled() {
            return Err(ApiError::Disabled);
        }
        let url = format!("{}/npc/message", self.config.base_url);
        let body = serde_json::json!({
            "customer_id": customer_id,
            "text": text,
        });
        self.post_reply(&url, &body).await
    }

    /// Ask for a parting line before a customer is banned.
    pub async fn farewell_line(&self, customer_id: u32) -> Result<Vec<String>, ApiError> {
        if !self.is_enabled() {
            return Err(ApiError::Disabled);
        }
        let url = format!("{}/npc/farewell", self.config.base_url);
        let body = serde_json::json!({ "customer_id": customer_id });
        self.post_reply(&url, &body).await
    }

    /// Look up a spell by its (trimmed, case-folded) name. `NotFound` is a
    /// normal negative result; `Err` means the collaborator was unreachable.
    pub async fn lookup_spell(&self, name: &str) -> Result<SpellLookup, ApiError> {
        if !self.is_enabled() {
            return Err(ApiError::Disabled);
        }
        let url = format!(
            "{}/spells?name={}",
            self.config.base_url,
            urlencoding::encode(name)
        );
        debug!("spell lookup: {}", url);
        crate::metrics::inc_api_requests();
        let result = self.lookup_spell_inner(&url).await;
        if result.is_err() {
            crate::metrics::inc_api_failures();
        }
        result
    }

    async fn lookup_spell_inner(&self, url: &str) -> Result<SpellLookup, ApiError> {
        let response = timeout(self.request_timeout(), self.client.get(url).send())
            .await
            .map_err(|_| ApiError::Timeout(self.config.timeout_seconds))??;

        if response.status().as_u16() == 404 {
            return Ok(SpellLookup::NotFound);
        }
        if !response.status().is_success() {
            return Err(ApiError::Status(response.status().as_u16()));
        }
        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))?;
        Ok(SpellLookup::Found(classify_spell_payload(&value)))
    }

    /// Persist a customer's wallet total, best-effort. The local balance has
    /// already been applied by the time this is called; failure only logs.
    pub async fn persist_wallet(&self, customer_id: u32, total: i64) {
        if !self.is_enabled() {
            return;
        }
        let url = format!("{}/customers/{}/wallet", self.config.base_url, customer_id);
        let body = serde_json::json!({ "total": total });
        crate::metrics::inc_api_requests();
        let result = timeout(
            self.request_timeout(),
            self.client.put(&url).json(&body).send(),
        )
        .await;
        match result {
            Ok(Ok(resp)) if resp.status().is_success() => {
                debug!("wallet persisted for customer {}: {}", customer_id, total);
            }
            Ok(Ok(resp)) => {
                crate::metrics::inc_api_failures();
                warn!(
                    "wallet persistence for customer {} returned {}",
                    customer_id,
                    resp.status()
                );
            }
            Ok(Err(e)) => {
                crate::metrics::inc_api_failures();
                warn!("wallet persistence for customer {} failed: {}", customer_id, e);
            }
            Err(_) => {
                crate::metrics::inc_api_failures();
                warn!(
                    "wallet persistence for customer {} timed out after {}s",
                    customer_id, self.config.timeout_seconds
                );
            }
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, ApiError> {
        crate::metrics::inc_api_requests();
        let result = self.get_json_inner(url).await;
        if result.is_err() {
            crate::metrics::inc_api_failures();
        }
        result
    }

    async fn get_json_inner<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
    ) -> Result<T, ApiError> {
        let response = timeout(self.request_timeout(), self.client.get(url).send())
            .await
            .map_err(|_| ApiError::Timeout(self.config.timeout_seconds))??;
        if !response.status().is_success() {
            return Err(ApiError::Status(response.status().as_u16()));
        }
        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))
    }

    async fn post_reply(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<Vec<String>, ApiError> {
        crate::metrics::inc_api_requests();
        let result = self.post_reply_inner(url, body).await;
        if result.is_err() {
            crate::metrics::inc_api_failures();
        }
        result
    }

    async fn post_reply_inner(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<Vec<String>, ApiError> {
        let response = timeout(
            self.request_timeout(),
            self.client.post(url).json(body).send(),
        )
        .await
        .map_err(|_| ApiError::Timeout(self.config.timeout_seconds))??;
        if !response.status().is_success() {
            return Err(ApiError::Status(response.status().as_u16()));
        }
        let parsed: ReplyBody = response
            .json()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))?;
        let lines = parsed.into_lines();
        if lines.is_empty() {
            return Err(ApiError::Decode("empty reply lines".to_string()));
        }
        Ok(lines)
    }
}

/// Classify an ad hoc spell payload into an explicit effect kind.
///
/// The collaborator answers in one of three shapes: `{"effect": "..."}` with
/// one of the fixed category strings, `{"gold": n}` for monetary effects, or
/// anything else (freeform text or unknown structure), which narrates without
/// consequence.
pub fn classify_spell_payload(value: &serde_json::Value) -> SpellEffect {
    if let Some(effect) = value.get("effect").and_then(|v| v.as_str()) {
        return match effect {
            "lethal" => SpellEffect::Lethal,
            "survived" => SpellEffect::Survived,
            "cursed" => SpellEffect::Cursed,
            other => SpellEffect::Generic(other.to_string()),
        };
    }
    if let Some(gold) = value.get("gold").and_then(|v| v.as_i64()) {
        return SpellEffect::Monetary(gold);
    }
    if let Some(text) = value.as_str() {
        return SpellEffect::Generic(text.to_string());
    }
    if let Some(text) = value.get("text").and_then(|v| v.as_str()) {
        return SpellEffect::Generic(text.to_string());
    }
    SpellEffect::Generic("何かが起きた気がする…".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_fixed_categories_exactly() {
        let lethal = serde_json::json!({"effect": "lethal"});
        let survived = serde_json::json!({"effect": "survived"});
        let cursed = serde_json::json!({"effect": "cursed"});
        assert_eq!(classify_spell_payload(&lethal), SpellEffect::Lethal);
        assert_eq!(classify_spell_payload(&survived), SpellEffect::Survived);
        assert_eq!(classify_spell_payload(&cursed), SpellEffect::Cursed);
        // Near-misses are narration, not effects.
        let near = serde_json::json!({"effect": "Lethal"});
        assert!(matches!(
            classify_spell_payload(&near),
            SpellEffect::Generic(_)
        ));
    }

    #[test]
    fn classify_monetary_payload() {
        let gold = serde_json::json!({"gold": -250});
        assert_eq!(classify_spell_payload(&gold), SpellEffect::Monetary(-250));
    }

    #[test]
    fn classify_freeform_text() {
        let text = serde_json::json!("まばゆい光があたりを包んだ！");
        assert_eq!(
            classify_spell_payload(&text),
            SpellEffect::Generic("まばゆい光があたりを包んだ！".to_string())
        );
    }

    #[test]
    fn classify_unknown_structure_falls_back() {
        let odd = serde_json::json!({"mana": 3});
        assert!(matches!(classify_spell_payload(&odd), SpellEffect::Generic(_)));
    }

    #[test]
    fn opening_fallback_keyed_by_glyph() {
        assert!(opening_fallback(Some("🧸")).contains("アルパカ"));
        assert_eq!(opening_fallback(None), OPENING_FALLBACK_GENERIC);
        assert_eq!(opening_fallback(Some("??")), OPENING_FALLBACK_GENERIC);
    }

    #[test]
    fn reply_body_both_shapes() {
        let lines: ReplyBody =
            serde_json::from_str(r#"{"lines": ["a", "b"]}"#).unwrap();
        assert_eq!(lines.into_lines(), vec!["a".to_string(), "b".to_string()]);
        let single: ReplyBody = serde_json::from_str(r#"{"reply": "c"}"#).unwrap();
        assert_eq!(single.into_lines(), vec!["c".to_string()]);
    }

    #[test]
    fn disabled_client_short_circuits() {
        let client = NpcChatClient::new(ApiConfig::default());
        assert!(!client.is_enabled());
    }

    #[test]
    fn remote_profile_tolerates_missing_fields() {
        let profile: RemoteProfile = serde_json::from_str(r#"{"name": "ミカ"}"#).unwrap();
        assert_eq!(profile.name, "ミカ");
        assert!(profile.age.is_none());
        assert!(profile.icon_urls.is_none());
    }
}
