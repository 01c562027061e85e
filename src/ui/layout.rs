use ratatui::layout::{Constraint, Flex, Layout, Margin, Position, Rect};
use unicode_width::UnicodeWidthStr;

pub const ARM_LABEL: &str = "[ Armer ]";
pub const RESET_LABEL: &str = "[ Rejouer ]";

const LIGHT_WIDTH: u16 = 9;
const LIGHT_HEIGHT: u16 = 4;

/// Screen regions of the game, shared by rendering and mouse hit-testing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameLayout {
    /// Everything inside the outer border; clicks here count as reactions
    pub panel: Rect,
    pub lights: [Rect; 3],
    pub status: Rect,
    pub readout: Rect,
    pub result: Rect,
    pub chart: Rect,
    pub arm_button: Rect,
    pub reset_button: Rect,
    pub legend: Rect,
}

impl GameLayout {
    pub fn new(area: Rect) -> Self {
        let panel = area.inner(Margin::new(1, 1));

        let [lights_row, status, readout, result, chart, buttons, legend] = Layout::vertical([
            Constraint::Length(LIGHT_HEIGHT + 1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(2),
            Constraint::Min(0),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .areas(panel);

        let lights = Layout::horizontal([Constraint::Length(LIGHT_WIDTH); 3])
            .spacing(2)
            .flex(Flex::Center)
            .areas(Rect {
                height: lights_row.height.min(LIGHT_HEIGHT),
                ..lights_row
            });

        let [arm_button, reset_button] = Layout::horizontal([
            Constraint::Length(ARM_LABEL.width() as u16),
            Constraint::Length(RESET_LABEL.width() as u16),
        ])
        .spacing(3)
        .flex(Flex::Center)
        .areas(buttons);

        Self {
            panel,
            lights,
            status,
            readout,
            result,
            chart,
            arm_button,
            reset_button,
            legend,
        }
    }

    pub fn hit(&self, column: u16, row: u16) -> Hit {
        let pos = Position::new(column, row);
        if self.arm_button.contains(pos) {
            Hit::Arm
        } else if self.reset_button.contains(pos) {
            Hit::Reset
        } else if self.panel.contains(pos) {
            Hit::Panel
        } else {
            Hit::Outside
        }
    }
}

/// What a mouse click landed on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hit {
    Arm,
    Reset,
    Panel,
    Outside,
}
