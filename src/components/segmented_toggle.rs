use crate::message::Message;
use iced::widget::text::Wrapping;
use iced::widget::{button, container, Container, Row};
use iced::{Alignment, Background, Color, Element, Length, Shadow, Theme};

/// A pill-shaped row of mutually exclusive options.
pub fn segmented_toggle<T, F>(
    options: &[(&'static str, T)],
    current: T,
    on_select: F,
) -> Container<'static, Message>
where
    T: Copy + PartialEq + 'static,
    F: Fn(T) -> Message,
{
    let last = options.len().saturating_sub(1);
    let segments: Vec<Element<'static, Message>> = options
        .iter()
        .enumerate()
        .map(|(index, (label, value))| {
            let position = match index {
                0 if last == 0 => SegmentPosition::Only,
                0 => SegmentPosition::Left,
                i if i == last => SegmentPosition::Right,
                _ => SegmentPosition::Middle,
            };
            segmented_toggle_option(label, *value == current, on_select(*value), position)
                .width(Length::FillPortion(1))
                .into()
        })
        .collect();

    container(Row::with_children(segments).spacing(0))
        .padding(3)
        .width(Length::Fill)
        .style(segmented_container_style)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SegmentPosition {
    Left,
    Middle,
    Right,
    Only,
}

fn segmented_toggle_option(
    label: &'static str,
    is_active: bool,
    on_press: Message,
    position: SegmentPosition,
) -> iced::widget::Button<'static, Message> {
    let content = container(iced::widget::text(label).size(13).wrapping(Wrapping::None))
        .width(Length::Fill)
        .height(Length::Fixed(28.0))
        .align_x(Alignment::Center)
        .align_y(Alignment::Center)
        .padding([4, 10]);

    button(content)
        .padding(0)
        .on_press(on_press)
        .style(move |theme, status| segmented_button_style(theme, status, is_active, position))
}

fn segmented_container_style(theme: &Theme) -> iced::widget::container::Style {
    let palette = theme.extended_palette();

    iced::widget::container::Style {
        background: Some(Background::Color(palette.background.strong.color)),
        border: iced::border::Border {
            color: palette.background.strong.color.scale_alpha(0.6),
            width: 1.0,
            radius: iced::border::Radius::new(999.0),
        },
        ..Default::default()
    }
}

fn segmented_button_style(
    theme: &Theme,
    status: iced::widget::button::Status,
    is_active: bool,
    position: SegmentPosition,
) -> iced::widget::button::Style {
    let palette = theme.extended_palette();

    let mut background_color = if is_active {
        palette.primary.strong.color
    } else {
        palette.background.strong.color.scale_alpha(0.4)
    };

    match status {
        iced::widget::button::Status::Hovered => {
            background_color = if is_active {
                palette.primary.base.color
            } else {
                palette.background.base.color.scale_alpha(0.8)
            };
        }
        iced::widget::button::Status::Pressed => {
            background_color = background_color.scale_alpha(0.9);
        }
        iced::widget::button::Status::Disabled => {
            background_color = background_color.scale_alpha(0.5);
        }
        iced::widget::button::Status::Active => {}
    }

    let text_color = if is_active {
        palette.primary.strong.text
    } else {
        palette.background.base.text
    };

    let (outer, inner) = (999.0, 6.0);
    let radius = match position {
        SegmentPosition::Left => iced::border::Radius {
            top_left: outer,
            top_right: inner,
            bottom_right: inner,
            bottom_left: outer,
        },
        SegmentPosition::Middle => iced::border::Radius::new(inner),
        SegmentPosition::Right => iced::border::Radius {
            top_left: inner,
            top_right: outer,
            bottom_right: outer,
            bottom_left: inner,
        },
        SegmentPosition::Only => iced::border::Radius::new(outer),
    };

    iced::widget::button::Style {
        background: Some(Background::Color(background_color)),
        text_color,
        border: iced::border::Border {
            color: Color::TRANSPARENT,
            width: 0.0,
            radius,
        },
        shadow: Shadow::default(),
    }
}
