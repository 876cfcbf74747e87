//! Authorization context and capability checks.
//!
//! Every gateway call receives an explicit [`AuthContext`]; nothing is resolved
//! from ambient state. Whether the actor may perform an action is decided by an
//! [`Authorizer`], which lives outside the ledger logic.

use crate::{
    entities::{Membership, membership},
    errors::{Error, Result},
};
use sea_orm::{ConnectionTrait, EntityTrait};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Permission codenames understood by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Read the meal grid
    ViewMeals,
    /// Write meal cells
    AddMeal,
    /// Read expenses
    ViewExpenses,
    /// Record expenses
    AddExpense,
    /// Change existing expenses
    EditExpense,
    /// Remove expenses
    DeleteExpense,
    /// Lock a month
    CloseMonth,
    /// Unlock a month
    ReopenMonth,
    /// Write meals or expenses on behalf of another member
    EditOtherUsers,
    /// Change member month status
    ManageMembers,
}

impl Capability {
    /// Every capability, e.g. for an owner role.
    pub const ALL: [Self; 10] = [
        Self::ViewMeals,
        Self::AddMeal,
        Self::ViewExpenses,
        Self::AddExpense,
        Self::EditExpense,
        Self::DeleteExpense,
        Self::CloseMonth,
        Self::ReopenMonth,
        Self::EditOtherUsers,
        Self::ManageMembers,
    ];

    /// Stable string code, also used in error messages.
    #[must_use]
    pub const fn codename(self) -> &'static str {
        match self {
            Self::ViewMeals => "view_meals",
            Self::AddMeal => "add_meal",
            Self::ViewExpenses => "view_expenses",
            Self::AddExpense => "add_expense",
            Self::EditExpense => "edit_expense",
            Self::DeleteExpense => "delete_expense",
            Self::CloseMonth => "close_month",
            Self::ReopenMonth => "reopen_month",
            Self::EditOtherUsers => "edit_other_users",
            Self::ManageMembers => "manage_members",
        }
    }
}

/// Who is acting, and in which flat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthContext {
    /// Flat every id in the call is scoped to
    pub flat_id: i64,
    /// Membership id of the actor
    pub actor_id: i64,
}

impl AuthContext {
    /// Creates a context for `actor_id` acting in `flat_id`.
    #[must_use]
    pub const fn new(flat_id: i64, actor_id: i64) -> Self {
        Self { flat_id, actor_id }
    }
}

/// Decides whether an actor holds a capability in a flat.
pub trait Authorizer: Send + Sync {
    /// Returns `true` if the actor of `ctx` holds `capability`.
    fn has_capability(&self, ctx: &AuthContext, capability: Capability) -> bool;
}

/// Fails with [`Error::Forbidden`] unless the actor holds `capability`.
pub fn require<A>(authorizer: &A, ctx: &AuthContext, capability: Capability) -> Result<()>
where
    A: Authorizer + ?Sized,
{
    if authorizer.has_capability(ctx, capability) {
        Ok(())
    } else {
        Err(Error::Forbidden {
            capability: capability.codename(),
        })
    }
}

/// Checks `capability`, plus [`Capability::EditOtherUsers`] when the write
/// targets someone other than the actor.
pub fn require_for_member<A>(
    authorizer: &A,
    ctx: &AuthContext,
    capability: Capability,
    member_id: i64,
) -> Result<()>
where
    A: Authorizer + ?Sized,
{
    require(authorizer, ctx, capability)?;
    if member_id != ctx.actor_id {
        require(authorizer, ctx, Capability::EditOtherUsers)?;
    }
    Ok(())
}

/// Capability sets resolved from membership roles.
#[derive(Debug, Clone, Default)]
pub struct RoleTable {
    grants: HashMap<(i64, i64), HashSet<Capability>>,
}

impl RoleTable {
    /// Builds the table from every membership and a role -> capabilities map.
    ///
    /// Memberships with an unknown role get no capabilities.
    pub async fn load<C>(db: &C, roles: &HashMap<String, Vec<Capability>>) -> Result<Self>
    where
        C: ConnectionTrait,
    {
        let mut table = Self::default();
        for member in Membership::find().all(db).await? {
            table.grant_role(&member, roles);
        }
        Ok(table)
    }

    /// Adds the capabilities of `member`'s role.
    pub fn grant_role(
        &mut self,
        member: &membership::Model,
        roles: &HashMap<String, Vec<Capability>>,
    ) {
        let capabilities = roles.get(&member.role).cloned().unwrap_or_default();
        self.grant(member.flat_id, member.id, capabilities);
    }

    /// Adds capabilities to a member of a flat.
    pub fn grant<I>(&mut self, flat_id: i64, member_id: i64, capabilities: I)
    where
        I: IntoIterator<Item = Capability>,
    {
        self.grants
            .entry((flat_id, member_id))
            .or_default()
            .extend(capabilities);
    }
}

impl Authorizer for RoleTable {
    fn has_capability(&self, ctx: &AuthContext, capability: Capability) -> bool {
        self.grants
            .get(&(ctx.flat_id, ctx.actor_id))
            .is_some_and(|set| set.contains(&capability))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;

    #[test]
    fn test_codenames_round_trip_through_serde() {
        for capability in Capability::ALL {
            let json = serde_json::to_string(&capability).unwrap_or_default();
            assert_eq!(json, format!("\"{}\"", capability.codename()));
        }
    }

    #[test]
    fn test_require_reports_missing_capability() {
        let mut table = RoleTable::default();
        table.grant(1, 10, [Capability::AddMeal]);
        let ctx = AuthContext::new(1, 10);

        assert!(require(&table, &ctx, Capability::AddMeal).is_ok());
        assert!(matches!(
            require(&table, &ctx, Capability::CloseMonth),
            Err(Error::Forbidden {
                capability: "close_month"
            })
        ));

        // grants do not leak across flats
        assert!(!table.has_capability(&AuthContext::new(2, 10), Capability::AddMeal));
    }

    #[test]
    fn test_writing_for_others_needs_extra_capability() {
        let mut table = RoleTable::default();
        table.grant(1, 10, [Capability::AddMeal]);
        let ctx = AuthContext::new(1, 10);

        assert!(require_for_member(&table, &ctx, Capability::AddMeal, 10).is_ok());
        assert!(matches!(
            require_for_member(&table, &ctx, Capability::AddMeal, 11),
            Err(Error::Forbidden {
                capability: "edit_other_users"
            })
        ));

        table.grant(1, 10, [Capability::EditOtherUsers]);
        assert!(require_for_member(&table, &ctx, Capability::AddMeal, 11).is_ok());
    }

    #[tokio::test]
    async fn test_load_maps_roles() -> Result<()> {
        let (db, flat, alice, bob) = setup_with_flat().await?;
        let roles = HashMap::from([
            ("owner".to_string(), Capability::ALL.to_vec()),
            ("member".to_string(), vec![Capability::ViewMeals]),
        ]);

        let table = RoleTable::load(&db, &roles).await?;

        assert!(table.has_capability(
            &AuthContext::new(flat.id, alice.id),
            Capability::ManageMembers
        ));
        assert!(table.has_capability(&AuthContext::new(flat.id, bob.id), Capability::ViewMeals));
        assert!(!table.has_capability(&AuthContext::new(flat.id, bob.id), Capability::AddMeal));

        Ok(())
    }
}
