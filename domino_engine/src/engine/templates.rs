//! Tournament template administration.
//!
//! Templates are immutable after creation; administrators create and delete
//! them. Deleting a template refunds and dismantles its open tables, while
//! tables already playing keep their copied settings and finish on their
//! own.

use chrono::Utc;
use log::{error, info};
use serde::{Deserialize, Serialize};

use super::DominoEngine;
use crate::errors::{EngineError, EngineResult};
use crate::game::entities::{
    EntryTransaction, EntryTxKind, GameStatus, RulesetType, TemplateStatus, TournamentTemplate,
    UserId, UserRole,
};
use crate::store::Mutation;

/// Parameters for a new tournament template.
#[derive(Clone, Debug, Deserialize)]
pub struct NewTemplate {
    pub name: String,
    pub ruleset: RulesetType,
    pub entry_fee_usd_cents: i64,
}

/// What deleting a template dismantled.
#[derive(Clone, Debug, Serialize)]
pub struct TemplateDeletion {
    pub template_id: String,
    pub games_removed: usize,
    pub entries_refunded: usize,
}

impl DominoEngine {
    async fn require_admin(&self, user_id: &str) -> EngineResult<()> {
        let user = self.require_user(user_id).await?;
        if user.role != UserRole::Admin {
            return Err(EngineError::AdminRequired);
        }
        Ok(())
    }

    /// Create a tournament template.
    ///
    /// # Errors
    ///
    /// `AdminRequired`, or `InvalidArgument` for a bad name or an entry fee
    /// outside the offered tiers.
    pub async fn create_tournament_template(
        &self,
        admin_id: &str,
        request: NewTemplate,
    ) -> EngineResult<TournamentTemplate> {
        self.require_admin(admin_id).await?;

        let name = request.name.trim().to_string();
        if name.len() < 3 || name.len() > 50 {
            return Err(EngineError::InvalidArgument(
                "template name must be 3 to 50 characters".into(),
            ));
        }
        if !self.config.is_allowed_entry_fee(request.entry_fee_usd_cents) {
            return Err(EngineError::InvalidArgument(format!(
                "entry fee of {} USD cents is not offered",
                request.entry_fee_usd_cents
            )));
        }

        let template = TournamentTemplate {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            ruleset: request.ruleset,
            entry_fee_usd_cents: request.entry_fee_usd_cents,
            entry_fee_ves: self.config.fee_in_ves(request.entry_fee_usd_cents),
            status: TemplateStatus::Open,
            max_players: self.config.max_players,
            target_score: self.config.target_score,
            created_by: admin_id.to_string(),
            created_at: Utc::now(),
        };
        self.store
            .commit(&[], vec![Mutation::PutTemplate(template.clone())])
            .await?;
        info!(
            "template {} ({}) created by {admin_id} at {} VES",
            template.id, template.name, template.entry_fee_ves
        );
        Ok(template)
    }

    /// Delete a template and dismantle its open tables, refunding every
    /// seated entry and cancelling pending countdowns.
    pub async fn delete_tournament_template(
        &self,
        admin_id: &str,
        template_id: &str,
    ) -> EngineResult<TemplateDeletion> {
        self.require_admin(admin_id).await?;
        self.require_template(template_id).await?;

        let games = self.store.list_games_for_template(template_id).await?;

        let mut mutations = vec![Mutation::DeleteTemplate(template_id.to_string())];
        let mut guards = Vec::new();
        let mut tasks: Vec<String> = Vec::new();
        let mut credits: Vec<(UserId, i64)> = Vec::new();
        let mut games_removed = 0usize;

        for snapshot in &games {
            if !matches!(
                snapshot.game.status,
                GameStatus::Waiting | GameStatus::Full
            ) {
                continue;
            }
            guards.push(snapshot.guard());
            mutations.push(Mutation::DeleteGame(snapshot.game.id.clone()));
            tasks.extend(snapshot.game.scheduled_start_id.clone());
            games_removed += 1;

            let fee = snapshot.game.entry_fee_ves;
            for player in &snapshot.players {
                credits.push((player.user_id.clone(), fee));
                mutations.push(Mutation::PutTransaction(EntryTransaction::record(
                    EntryTxKind::Refund,
                    fee,
                    &player.user_id,
                    &snapshot.game,
                )));
                mutations.push(Mutation::RemoveActiveGame {
                    user_id: player.user_id.clone(),
                    game_id: snapshot.game.id.clone(),
                });
            }
        }

        self.store.commit(&guards, mutations).await?;

        for task_id in &tasks {
            self.cancel_task(Some(task_id)).await;
        }
        let entries_refunded = credits.len();
        for (user_id, amount) in credits {
            if let Err(err) = self.ledger.increment(&user_id, amount).await {
                error!("refund credit of {amount} VES to {user_id} failed: {err}");
            }
        }

        info!(
            "template {template_id} deleted by {admin_id}: {games_removed} table(s) \
             dismantled, {entries_refunded} entr(ies) refunded"
        );
        Ok(TemplateDeletion {
            template_id: template_id.to_string(),
            games_removed,
            entries_refunded,
        })
    }
}
