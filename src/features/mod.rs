// Message, member and interaction features
pub mod auto_embed;
pub mod honeypot;
pub mod invite_block;
pub mod member_events;
pub mod permissions;
pub mod pipeline;
pub mod role_restore;
pub mod setup_menu;
