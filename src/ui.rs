pub mod charting;
pub mod layout;

use launch_control::{session::MAX_TRIES, TrialState};
use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Bar, BarChart, BarGroup, Block, BorderType, Paragraph, Widget, Wrap},
};

use crate::{
    ui::{
        charting::{bar_labels, compute_chart_max, format_ms},
        layout::{GameLayout, ARM_LABEL, RESET_LABEL},
    },
    App,
};

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let game = &self.game;
        let layout = GameLayout::new(area);

        // styles
        let bold_style = Style::default().add_modifier(Modifier::BOLD);
        let dim_style = Style::default().add_modifier(Modifier::DIM);
        let italic_style = Style::default().add_modifier(Modifier::ITALIC);

        Block::bordered()
            .border_type(BorderType::Rounded)
            .title(" Launch Control ")
            .title_alignment(Alignment::Center)
            .render(area, buf);

        let lights = game.lights();
        for (rect, (on, color)) in layout.lights.iter().zip([
            (lights.red, Color::Red),
            (lights.amber, Color::Yellow),
            (lights.green, Color::Green),
        ]) {
            let style = if on {
                Style::default().fg(color).bg(color)
            } else {
                Style::default().fg(Color::DarkGray)
            };
            Block::bordered()
                .border_type(BorderType::Rounded)
                .style(style)
                .render(*rect, buf);
        }

        let status_style = match game.state() {
            TrialState::Go => bold_style.fg(Color::Green),
            TrialState::FalseStart => bold_style.fg(Color::Red),
            _ => bold_style,
        };
        Paragraph::new(Span::styled(game.status(), status_style))
            .alignment(Alignment::Center)
            .render(layout.status, buf);

        let session = game.session();
        let readout = format!(
            "Essai {}/{}   Dernier {}   Moyenne {}   Meilleur {}   Record {}",
            session.tries(),
            MAX_TRIES,
            format_ms(session.last()),
            format_ms(session.average()),
            format_ms(session.best()),
            format_ms(game.records().best_single),
        );
        Paragraph::new(readout)
            .alignment(Alignment::Center)
            .render(layout.readout, buf);

        Paragraph::new(Span::styled(
            game.result(),
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::ITALIC),
        ))
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .render(layout.result, buf);

        let times = session.reaction_times();
        if times.is_empty() {
            Paragraph::new(Span::styled(
                "Arme les feux, puis réagis dès le vert.",
                dim_style,
            ))
            .alignment(Alignment::Center)
            .render(layout.chart, buf);
        } else {
            let labels = bar_labels(times);
            let bars: Vec<Bar> = labels
                .iter()
                .zip(times)
                .map(|(label, &ms)| {
                    let color = match game.records().best_single {
                        Some(record) if ms <= record => Color::Green,
                        _ => Color::Magenta,
                    };
                    Bar::default()
                        .label(Line::from(label.as_str()))
                        .value(ms)
                        .style(Style::default().fg(color))
                })
                .collect();

            BarChart::default()
                .block(Block::bordered().title(" Temps (ms) "))
                .bar_width(7)
                .bar_gap(2)
                .max(compute_chart_max(times, game.records().best_single))
                .data(BarGroup::default().bars(&bars))
                .render(layout.chart, buf);
        }

        let controls = game.controls();
        let button_style = |enabled: bool| {
            if enabled {
                bold_style.fg(Color::Cyan)
            } else {
                dim_style
            }
        };
        Paragraph::new(Span::styled(ARM_LABEL, button_style(controls.arm)))
            .render(layout.arm_button, buf);
        Paragraph::new(Span::styled(RESET_LABEL, button_style(controls.reset)))
            .render(layout.reset_button, buf);

        let key_label = match self.reaction_key {
            ' ' => "espace".to_string(),
            c => c.to_string(),
        };
        Paragraph::new(Span::styled(
            format!("({key_label}) réagir / (a)rmer / (r)ejouer / (esc)ape"),
            italic_style,
        ))
        .alignment(Alignment::Center)
        .render(layout.legend, buf);
    }
}
