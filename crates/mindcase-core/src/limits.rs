/// Daily earn policy.
///
/// Only minigame rewards are capped per account-day; ad and bonus credits are
/// uncapped and do not advance the daily counter. Premium entitlements lift the
/// cap entirely.

/// Daily minigame earn cap for non-premium accounts, in tokens.
pub const FREE_DAILY_EARN_CAP: i64 = 30;

/// Tokens credited per de-duplicated rewarded-ad event.
pub const AD_REWARD_TOKENS: i64 = 5;

/// Default minigame reward for a successful run, in tokens.
pub const MINIGAME_REWARD_TOKENS: i64 = 3;

pub fn daily_limit(premium: bool) -> i64 {
    if premium {
        i64::MAX
    } else {
        FREE_DAILY_EARN_CAP
    }
}

/// Tokens still creditable from daily-limited sources today.
pub fn remaining_today(premium: bool, tokens_earned_today: i64) -> i64 {
    daily_limit(premium).saturating_sub(tokens_earned_today).max(0)
}
