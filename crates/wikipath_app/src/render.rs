use wikipath_core::DisplayModel;

/// Turns the display model into the lines printed once a search settles.
pub fn render(view: &DisplayModel) -> Vec<String> {
    let mut lines = vec![view.headline.clone()];

    if let Some(search_id) = &view.search_id {
        lines.push(format!("Search ID: {search_id}"));
    }

    if !view.path_links.is_empty() {
        lines.push("Path:".to_string());
        for (step, link) in view.path_links.iter().enumerate() {
            if link.label == link.url {
                lines.push(format!("  {}. {}", step + 1, link.label));
            } else {
                lines.push(format!("  {}. {} <{}>", step + 1, link.label, link.url));
            }
        }
    }

    if let Some(stats) = &view.statistics {
        lines.push(format!(
            "Pages discovered: {}",
            format_with_commas(stats.discovered)
        ));
        lines.push(format!("Path found: {}", stats.path_found));
        lines.push(format!(
            "Path length: {}",
            format_with_commas(stats.path_length as u64)
        ));
        if !stats.elapsed.is_empty() {
            lines.push(format!("Elapsed time: {}", stats.elapsed));
        }
        if !stats.method.is_empty() {
            lines.push(format!("Search method: {}", stats.method));
        }
    }

    if let Some(notice) = &view.notice {
        lines.push(format!("Note: {notice}"));
    }

    lines
}

/// One-line progress summary shown while a search runs.
pub fn progress_line(view: &DisplayModel) -> String {
    match &view.statistics {
        Some(stats) if stats.elapsed.is_empty() => format!(
            "{} ({} pages discovered)",
            view.headline,
            format_with_commas(stats.discovered)
        ),
        _ => view.headline.clone(),
    }
}

pub fn format_with_commas(value: u64) -> String {
    let mut out = String::new();
    for (i, ch) in value.to_string().chars().rev().enumerate() {
        if i != 0 && i % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out.chars().rev().collect()
}
