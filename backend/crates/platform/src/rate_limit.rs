//! Rate Limiting Infrastructure
//!
//! Request admission decisions: bot detection, attack-signature shield and
//! per-key quotas behind a pluggable [`DecisionEngine`].
//!
//! Checks run in a fixed order (bot, shield, quota). A request denied by an
//! earlier check never consumes quota.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use thiserror::Error;

use crate::client::RequestMetadata;

/// Rate limit configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Maximum requests allowed in the window
    pub max_requests: u32,
    /// Time window duration
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 10,
            window: Duration::from_secs(60),
        }
    }
}

impl RateLimitConfig {
    pub fn new(max_requests: u32, window_secs: u64) -> Self {
        Self {
            max_requests,
            window: Duration::from_secs(window_secs),
        }
    }

    /// `max_requests` per sliding minute
    pub fn per_minute(max_requests: u32) -> Self {
        Self::new(max_requests, 60)
    }
}

/// Rate limit check result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitResult {
    pub allowed: bool,
    pub remaining: u32,
    /// Time until the oldest counted request leaves the window
    pub retry_after: Duration,
}

/// Why a request was refused
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenyReason {
    Bot,
    Shield,
    RateLimit { retry_after: Duration },
}

/// Engine verdict
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthDecision {
    Allow { remaining: u32 },
    Deny(DenyReason),
}

impl AuthDecision {
    pub fn is_denied(&self) -> bool {
        matches!(self, AuthDecision::Deny(_))
    }
}

/// The engine could not reach a verdict
#[derive(Debug, Error)]
pub enum DecisionError {
    #[error("Decision engine unavailable: {0}")]
    Unavailable(String),
}

/// Trait for admission decision backends
#[trait_variant::make(DecisionEngine: Send)]
pub trait LocalDecisionEngine {
    /// Evaluate `request` against the bucket `key` with quota `limit`
    async fn decide(
        &self,
        key: &str,
        limit: &RateLimitConfig,
        request: &RequestMetadata,
    ) -> Result<AuthDecision, DecisionError>;
}

// ============================================================================
// Bot policy
// ============================================================================

/// User-Agent based automation detection
///
/// Markers are matched against product names only (the leading token and
/// every `name/version` token), so device models in the platform comment
/// such as `CUBOT X30` are not mistaken for crawlers.
#[derive(Debug, Clone)]
pub struct BotPolicy {
    /// Product name contains one of these
    tools: Vec<String>,
    /// Product name ends with one of these (`Googlebot`, `bingbot`, ...)
    suffixes: Vec<String>,
    allowed: Vec<String>,
    block_missing_user_agent: bool,
}

impl Default for BotPolicy {
    fn default() -> Self {
        Self {
            tools: [
                "curl",
                "wget",
                "python-requests",
                "httpclient",
                "scrapy",
                "headless",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            suffixes: ["bot", "spider", "crawler"]
                .into_iter()
                .map(String::from)
                .collect(),
            allowed: Vec::new(),
            block_missing_user_agent: true,
        }
    }
}

impl BotPolicy {
    /// Agents containing any of `patterns` pass even if they match a marker
    pub fn allow(mut self, patterns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.allowed
            .extend(patterns.into_iter().map(|p| p.into().to_lowercase()));
        self
    }

    /// Accept requests without a User-Agent
    pub fn allow_missing_user_agent(mut self) -> Self {
        self.block_missing_user_agent = false;
        self
    }

    pub fn is_suspected(&self, request: &RequestMetadata) -> bool {
        let Some(agent) = request.user_agent().map(str::trim).filter(|ua| !ua.is_empty())
        else {
            return self.block_missing_user_agent;
        };

        let agent = agent.to_lowercase();
        if self.allowed.iter().any(|p| agent.contains(p.as_str())) {
            return false;
        }

        product_names(&agent).any(|name| {
            self.tools.iter().any(|t| name.contains(t.as_str()))
                || self.suffixes.iter().any(|s| name.ends_with(s.as_str()))
        })
    }
}

/// Product names of a User-Agent: the leading token and every `name/version`
fn product_names(agent: &str) -> impl Iterator<Item = &str> {
    let mut tokens = agent
        .split(|c: char| c.is_whitespace() || matches!(c, ';' | '(' | ')' | ','))
        .filter(|token| !token.is_empty());
    let leading = tokens.next();

    leading
        .into_iter()
        .chain(tokens.filter(|token| token.contains('/')))
        .filter_map(|token| token.split('/').next())
}

// ============================================================================
// Shield policy
// ============================================================================

/// Headers inspected for attack signatures besides path and query
const SHIELD_HEADERS: &[&str] = &["user-agent", "referer", "x-forwarded-host"];

/// Attack signature matching on path, query and selected headers
#[derive(Debug, Clone)]
pub struct ShieldPolicy {
    signatures: Vec<String>,
}

impl Default for ShieldPolicy {
    fn default() -> Self {
        Self {
            signatures: [
                // path traversal
                "../",
                "..\\",
                "/etc/passwd",
                // script injection
                "<script",
                "javascript:",
                "onerror=",
                "onload=",
                // sql injection
                "' or '1'='1",
                "' or 1=1",
                "\" or 1=1",
                "union select",
                "; drop table",
                "'--",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

impl ShieldPolicy {
    pub fn is_blocked(&self, request: &RequestMetadata) -> bool {
        let mut surfaces = vec![request.path.clone()];
        surfaces.extend(request.query.clone());
        surfaces.extend(
            SHIELD_HEADERS
                .iter()
                .filter_map(|name| request.headers.get(*name))
                .filter_map(|v| v.to_str().ok())
                .map(str::to_string),
        );

        surfaces.iter().any(|raw| {
            let decoded = percent_decode(raw).to_lowercase();
            decoded.contains('\0')
                || self.signatures.iter().any(|sig| decoded.contains(sig.as_str()))
        })
    }
}

/// Upper bound on decoding rounds for nested encodings
const MAX_DECODE_PASSES: usize = 4;

/// Lossy `%XX` and `+` decoding, repeated until stable so that
/// double-encoded payloads (`%252e`) are matched too
fn percent_decode(input: &str) -> String {
    let mut current = input.to_string();
    for _ in 0..MAX_DECODE_PASSES {
        let next = percent_decode_once(&current);
        if next == current {
            break;
        }
        current = next;
    }
    current
}

fn percent_decode_once(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'%' if i + 2 < bytes.len()
                && bytes[i + 1].is_ascii_hexdigit()
                && bytes[i + 2].is_ascii_hexdigit() =>
            {
                out.push(hex_value(bytes[i + 1]) << 4 | hex_value(bytes[i + 2]));
                i += 3;
            }
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }

    String::from_utf8_lossy(&out).into_owned()
}

fn hex_value(digit: u8) -> u8 {
    match digit {
        b'0'..=b'9' => digit - b'0',
        b'a'..=b'f' => digit - b'a' + 10,
        b'A'..=b'F' => digit - b'A' + 10,
        _ => 0,
    }
}

// ============================================================================
// Sliding window engine
// ============================================================================

/// In-process engine with a sliding-window log per key
#[derive(Debug, Default)]
pub struct SlidingWindowEngine {
    buckets: Mutex<HashMap<String, VecDeque<Instant>>>,
    bot: BotPolicy,
    shield: ShieldPolicy,
}

impl SlidingWindowEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bot_policy(mut self, bot: BotPolicy) -> Self {
        self.bot = bot;
        self
    }

    pub fn with_shield_policy(mut self, shield: ShieldPolicy) -> Self {
        self.shield = shield;
        self
    }

    /// Count a request against `key` at `now`
    pub fn check_at(&self, key: &str, limit: &RateLimitConfig, now: Instant) -> RateLimitResult {
        let mut buckets = self.buckets.lock();
        let log = buckets.entry(key.to_string()).or_default();

        while log
            .front()
            .is_some_and(|&t| now.saturating_duration_since(t) >= limit.window)
        {
            log.pop_front();
        }

        let count = u32::try_from(log.len()).unwrap_or(u32::MAX);
        if count < limit.max_requests {
            log.push_back(now);
            return RateLimitResult {
                allowed: true,
                remaining: limit.max_requests - count - 1,
                retry_after: Duration::ZERO,
            };
        }

        let retry_after = log
            .front()
            .map(|&oldest| limit.window.saturating_sub(now.saturating_duration_since(oldest)))
            .unwrap_or(limit.window);

        RateLimitResult {
            allowed: false,
            remaining: 0,
            retry_after,
        }
    }

    /// Drop buckets with no entry younger than `window`; returns how many
    pub fn prune(&self, window: Duration) -> usize {
        self.prune_at(window, Instant::now())
    }

    pub fn prune_at(&self, window: Duration, now: Instant) -> usize {
        let mut buckets = self.buckets.lock();
        let before = buckets.len();
        buckets.retain(|_, log| {
            log.back()
                .is_some_and(|&newest| now.saturating_duration_since(newest) < window)
        });
        before - buckets.len()
    }

    /// Number of tracked keys
    pub fn tracked_keys(&self) -> usize {
        self.buckets.lock().len()
    }

    fn decide_at(
        &self,
        key: &str,
        limit: &RateLimitConfig,
        request: &RequestMetadata,
        now: Instant,
    ) -> AuthDecision {
        if self.bot.is_suspected(request) {
            return AuthDecision::Deny(DenyReason::Bot);
        }
        if self.shield.is_blocked(request) {
            return AuthDecision::Deny(DenyReason::Shield);
        }

        let result = self.check_at(key, limit, now);
        if result.allowed {
            AuthDecision::Allow {
                remaining: result.remaining,
            }
        } else {
            AuthDecision::Deny(DenyReason::RateLimit {
                retry_after: result.retry_after,
            })
        }
    }
}

impl DecisionEngine for SlidingWindowEngine {
    async fn decide(
        &self,
        key: &str,
        limit: &RateLimitConfig,
        request: &RequestMetadata,
    ) -> Result<AuthDecision, DecisionError> {
        Ok(self.decide_at(key, limit, request, Instant::now()))
    }
}
