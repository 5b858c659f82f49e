use uuid::Uuid;

/// Automation rule identifier.
pub type RuleId = Uuid;

/// Campaign identifier as issued by the campaign service.
pub type CampaignId = String;

/// Owning account identifier.
pub type UserId = String;

/// Generate a fresh rule id.
pub fn new_rule_id() -> RuleId {
    Uuid::new_v4()
}
