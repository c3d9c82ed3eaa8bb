//! Permission overwrites applied to provisioned channels.

use poise::serenity_prelude::{GuildId, PermissionOverwrite, PermissionOverwriteType, Permissions, RoleId, UserId};

fn participant() -> Permissions {
    Permissions::VIEW_CHANNEL
        | Permissions::CONNECT
        | Permissions::SPEAK
        | Permissions::USE_VAD
        | Permissions::STREAM
        | Permissions::SEND_MESSAGES
        | Permissions::READ_MESSAGE_HISTORY
        | Permissions::EMBED_LINKS
        | Permissions::ATTACH_FILES
        | Permissions::USE_EXTERNAL_EMOJIS
        | Permissions::ADD_REACTIONS
}

/// Granted to members dragged into a private channel.
pub fn invitee() -> Permissions {
    participant()
}

pub fn staff() -> Permissions {
    participant() | Permissions::MOVE_MEMBERS | Permissions::MANAGE_CHANNELS
}

pub fn private_owner() -> Permissions {
    staff() | Permissions::MANAGE_ROLES
}

pub fn public_owner() -> Permissions {
    Permissions::MOVE_MEMBERS | Permissions::MANAGE_CHANNELS
}

pub fn member(user_id: UserId, allow: Permissions) -> PermissionOverwrite {
    PermissionOverwrite {
        allow,
        deny: Permissions::empty(),
        kind: PermissionOverwriteType::Member(user_id),
    }
}

fn role(role_id: RoleId, allow: Permissions, deny: Permissions) -> PermissionOverwrite {
    PermissionOverwrite {
        allow,
        deny,
        kind: PermissionOverwriteType::Role(role_id),
    }
}

/// Overwrites for a freshly provisioned channel, in the order they are applied.
///
/// Private channels stay visible but deny `CONNECT` to `@everyone`; the owner
/// and every elevated role get explicit allows so staff keep oversight.
pub fn channel_overwrites(
    guild_id: GuildId,
    owner_id: UserId,
    is_private: bool,
    elevated_roles: &[RoleId],
    restricted_role: Option<RoleId>,
) -> Vec<PermissionOverwrite> {
    if !is_private {
        return vec![member(owner_id, public_owner())];
    }

    let everyone = guild_id.everyone_role();
    let mut overwrites = vec![
        role(everyone, Permissions::VIEW_CHANNEL, Permissions::CONNECT),
        member(owner_id, private_owner()),
    ];

    if let Some(restricted) = restricted_role.filter(|id| *id != everyone) {
        overwrites.push(role(
            restricted,
            Permissions::VIEW_CHANNEL,
            Permissions::CONNECT | Permissions::MOVE_MEMBERS,
        ));
    }

    overwrites.extend(
        elevated_roles
            .iter()
            .filter(|id| **id != everyone && Some(**id) != restricted_role)
            .map(|id| role(*id, staff(), Permissions::empty())),
    );

    overwrites
}

#[cfg(test)]
mod tests {
    use super::*;

    const GUILD: GuildId = GuildId::new(1);
    const OWNER: UserId = UserId::new(10);

    #[test]
    fn public_channel_only_grants_owner_management() {
        let overwrites = channel_overwrites(GUILD, OWNER, false, &[RoleId::new(5)], None);

        assert_eq!(overwrites.len(), 1);
        assert_eq!(overwrites[0].kind, PermissionOverwriteType::Member(OWNER));
        assert_eq!(
            overwrites[0].allow,
            Permissions::MOVE_MEMBERS | Permissions::MANAGE_CHANNELS
        );
    }

    #[test]
    fn private_channel_denies_everyone_connect() {
        let overwrites = channel_overwrites(GUILD, OWNER, true, &[], None);
        let everyone = overwrites
            .iter()
            .find(|o| o.kind == PermissionOverwriteType::Role(GUILD.everyone_role()))
            .unwrap();

        assert!(everyone.deny.connect());
        assert!(everyone.allow.view_channel());
    }

    #[test]
    fn private_owner_has_full_control() {
        let overwrites = channel_overwrites(GUILD, OWNER, true, &[], None);
        let owner = overwrites
            .iter()
            .find(|o| o.kind == PermissionOverwriteType::Member(OWNER))
            .unwrap();

        assert!(owner.allow.connect());
        assert!(owner.allow.speak());
        assert!(owner.allow.manage_channels());
        assert!(owner.allow.move_members());
        assert!(owner.allow.manage_roles());
        assert!(owner.deny.is_empty());
    }

    #[test]
    fn elevated_roles_are_allowed_but_everyone_is_skipped() {
        let staff_role = RoleId::new(5);
        let overwrites =
            channel_overwrites(GUILD, OWNER, true, &[staff_role, GUILD.everyone_role()], None);

        let staff_overwrites: Vec<_> = overwrites
            .iter()
            .filter(|o| o.kind == PermissionOverwriteType::Role(staff_role))
            .collect();
        assert_eq!(staff_overwrites.len(), 1);
        assert!(staff_overwrites[0].allow.connect());

        let everyone_overwrites = overwrites
            .iter()
            .filter(|o| o.kind == PermissionOverwriteType::Role(GUILD.everyone_role()))
            .count();
        assert_eq!(everyone_overwrites, 1);
    }

    #[test]
    fn restricted_role_cannot_connect_or_drag() {
        let restricted = RoleId::new(7);
        let overwrites = channel_overwrites(GUILD, OWNER, true, &[], Some(restricted));
        let entry = overwrites
            .iter()
            .find(|o| o.kind == PermissionOverwriteType::Role(restricted))
            .unwrap();

        assert!(entry.deny.connect());
        assert!(entry.deny.move_members());
    }

    #[test]
    fn invitees_can_join_and_talk() {
        let allow = invitee();
        assert!(allow.view_channel() && allow.connect() && allow.speak() && allow.send_messages());
        assert!(!allow.manage_channels());
    }
}
