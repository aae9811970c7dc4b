use mongodb::{Client, Database};

#[derive(Clone)]
pub struct AppState {
    pub client: Client,
    pub db: Database,
    pub jwt_secret: String,
    pub referral_reward_amount: f64,
}

impl AppState {
    pub fn new(client: Client, db: Database, jwt_secret: String, referral_reward_amount: f64) -> Self {
        AppState {
            client,
            db,
            jwt_secret,
            referral_reward_amount,
        }
    }
}
