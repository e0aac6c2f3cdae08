use serenity::model::id::UserId;

use crate::error::{Error, Result};
use crate::session::PlayerSession;

/// Who issued a command, resolved by the chat adapter before dispatch.
#[derive(Clone, Debug)]
pub struct Caller {
    pub user_id: UserId,
    pub is_guild_owner: bool,
    pub is_bot_owner: bool,
    pub is_administrator: bool,
    pub has_dj_role: bool,
}

impl Caller {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            is_guild_owner: false,
            is_bot_owner: false,
            is_administrator: false,
            has_dj_role: false,
        }
    }
}

pub fn is_dj(session: &PlayerSession, caller: &Caller) -> bool {
    !session.dj_required
        || caller.is_guild_owner
        || caller.is_bot_owner
        || caller.has_dj_role
        || session.dj_members.contains(&caller.user_id)
}

pub fn require_dj(session: &PlayerSession, caller: &Caller) -> Result<()> {
    if is_dj(session, caller) {
        Ok(())
    } else {
        Err(Error::Unauthorized)
    }
}

/// DJ settings themselves are reserved to administrators and the guild owner.
pub fn require_admin(caller: &Caller) -> Result<()> {
    if caller.is_administrator || caller.is_guild_owner {
        Ok(())
    } else {
        Err(Error::NotAdministrator)
    }
}
