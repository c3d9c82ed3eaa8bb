use super::engine::DrawResult;
use super::store::{normalize_name, RaffleSummary};
use crate::utils::discord_timestamp;
use poise::serenity_prelude::{
    ButtonStyle, Colour, CreateActionRow, CreateButton, CreateEmbed, CreateEmbedFooter,
    Mentionable, Timestamp,
};

pub const ANNOUNCEMENT_COLOUR: Colour = Colour::new(0x6E8878);
pub const WINNER_COLOUR: Colour = Colour::new(0xFFD700);
pub const ENDED_COLOUR: Colour = Colour::new(0x808080);

const ENTER_PREFIX: &str = "raffle_enter:";
const PICK_PREFIX: &str = "raffle_pick:";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RaffleAction {
    Enter(String),
    Pick(String),
}

impl RaffleAction {
    pub fn parse(custom_id: &str) -> Option<Self> {
        if let Some(name) = custom_id.strip_prefix(ENTER_PREFIX) {
            return (!name.is_empty()).then(|| Self::Enter(name.to_string()));
        }
        if let Some(name) = custom_id.strip_prefix(PICK_PREFIX) {
            return (!name.is_empty()).then(|| Self::Pick(name.to_string()));
        }
        None
    }

    pub fn custom_id(&self) -> String {
        match self {
            Self::Enter(name) => format!("{}{}", ENTER_PREFIX, normalize_name(name)),
            Self::Pick(name) => format!("{}{}", PICK_PREFIX, normalize_name(name)),
        }
    }
}

pub fn announcement_embed(raffle: &RaffleSummary) -> CreateEmbed {
    let mut description = format!("**Prize:** {}", raffle.prize);
    if let Some(rules) = &raffle.rules {
        description.push_str(&format!("\n\n**Rules:**\n{}", rules));
    }

    CreateEmbed::new()
        .title(format!("🎉 {}", raffle.name))
        .description(description)
        .colour(ANNOUNCEMENT_COLOUR)
        .field("Winners", raffle.number_of_winners.to_string(), true)
        .field("Entries", raffle.entry_count.to_string(), true)
        .field(
            "End Date",
            format!(
                "{} ({})",
                discord_timestamp(raffle.end_time, 'F'),
                discord_timestamp(raffle.end_time, 'R')
            ),
            false,
        )
        .field("Organizer", raffle.created_by.mention().to_string(), true)
        .footer(CreateEmbedFooter::new("Good luck to all participants!"))
        .timestamp(Timestamp::now())
}

fn buttons(raffle: &RaffleSummary, disabled: bool) -> Vec<CreateActionRow> {
    vec![CreateActionRow::Buttons(vec![
        CreateButton::new(RaffleAction::Enter(raffle.name.clone()).custom_id())
            .label("Enter Raffle")
            .emoji('🎟')
            .style(ButtonStyle::Primary)
            .disabled(disabled),
        CreateButton::new(RaffleAction::Pick(raffle.name.clone()).custom_id())
            .label("Pick Winners")
            .emoji('🏆')
            .style(ButtonStyle::Secondary)
            .disabled(disabled),
    ])]
}

pub fn announcement_buttons(raffle: &RaffleSummary) -> Vec<CreateActionRow> {
    buttons(raffle, false)
}

pub fn closed_buttons(raffle: &RaffleSummary) -> Vec<CreateActionRow> {
    buttons(raffle, true)
}

/// Replaces the announcement once a raffle is resolved or cancelled.
pub fn ended_embed(raffle: &RaffleSummary, status: &str) -> CreateEmbed {
    CreateEmbed::new()
        .title(format!("🎉 {}", raffle.name))
        .description(format!("**Prize:** {}\n\n{}", raffle.prize, status))
        .colour(ENDED_COLOUR)
        .field("Entries", raffle.entry_count.to_string(), true)
        .field("Organizer", raffle.created_by.mention().to_string(), true)
        .timestamp(Timestamp::now())
}

pub fn winners_line(result: &DrawResult) -> String {
    result
        .winners
        .iter()
        .map(|winner| winner.mention().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn winners_embed(result: &DrawResult) -> CreateEmbed {
    let label = if result.winners.len() == 1 {
        "Winner"
    } else {
        "Winners"
    };

    CreateEmbed::new()
        .title(format!("🏆 {} Results", result.raffle.name))
        .description(format!(
            "**Prize:** {}\n**{}:** {}",
            result.raffle.prize,
            label,
            winners_line(result)
        ))
        .colour(WINNER_COLOUR)
        .field("Total Entries", result.total_entries.to_string(), true)
        .field("Valid Entries", result.valid_entries.to_string(), true)
        .timestamp(Timestamp::now())
}

pub fn winners_content(result: &DrawResult) -> String {
    format!(
        "🎉 **Raffle \"{}\" has ended!** Congratulations {}!",
        result.raffle.name,
        winners_line(result)
    )
}
