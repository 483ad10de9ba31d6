use crate::{
    core::{
        ranking::{RankingItem, Rankings},
        templates::MessageTemplate,
    },
    error::BoardResult,
};
use chrono::{DateTime, Local};
use itertools::Itertools;
use minijinja::context;

// Display one ranking as aligned `pos) player value` rows
pub fn standings(items: &[RankingItem]) -> String {
    // calculate width for positions
    // the width of the maximum position to be displayed
    let width_pos = items.len().to_string().len();

    // calculate width for names
    // the length of the longest name, plus one for padding
    let width_name = 1 + items
        .iter()
        .map(|item| item.player.chars().count())
        .max()
        .unwrap_or_default();

    // values are right aligned on the widest one
    let width_value = items
        .iter()
        .map(|item| item.display_value.chars().count())
        .max()
        .unwrap_or_default();

    items
        .iter()
        .enumerate()
        .map(|(idx, item)| {
            format!(
                "{:>width_pos$}) {:<width_name$} {:>width_value$}",
                // idx is zero-based
                idx + 1,
                item.player,
                item.display_value,
            )
        })
        .join("\n")
}

// Whole console page: header, then one section per score in configured order
pub fn rankings(
    page_title: &str,
    rankings: &Rankings,
    timestamp: DateTime<Local>,
) -> BoardResult<String> {
    let header = MessageTemplate::Header.get()?.render(context! {
        page_title => page_title,
        timestamp => timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
    })?;

    let sections = rankings
        .iter()
        .map(|(title, items)| -> BoardResult<String> {
            Ok(MessageTemplate::Standing.get()?.render(context! {
                title => title,
                standings => standings(items),
            })?)
        })
        .collect::<BoardResult<Vec<String>>>()?;

    Ok(std::iter::once(header).chain(sections).join("\n\n"))
}
