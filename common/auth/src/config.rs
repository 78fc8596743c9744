use chrono::Duration;

/// Lifetimes for each token scope.
#[derive(Debug, Clone)]
pub struct TokenConfig {
    /// How long an activation token stays redeemable.
    pub activation_ttl: Duration,
    /// How long a session (authentication) token stays valid.
    pub authentication_ttl: Duration,
}

impl TokenConfig {
    /// Construct config with the standard lifetimes (72h activation, 24h session).
    pub fn new() -> Self {
        Self {
            activation_ttl: Duration::hours(72),
            authentication_ttl: Duration::hours(24),
        }
    }

    pub fn with_activation_ttl(mut self, ttl: Duration) -> Self {
        self.activation_ttl = ttl;
        self
    }

    pub fn with_authentication_ttl(mut self, ttl: Duration) -> Self {
        self.authentication_ttl = ttl;
        self
    }
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self::new()
    }
}
