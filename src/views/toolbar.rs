use crate::components::segmented_toggle;
use crate::message::Message;
use crate::utils::{percent, slice_position};
use iced::widget::{button, checkbox, column, pick_list, row, slider, text};
use iced::{Alignment, Element, Length};
use slicemark::model::{Category, PropagationRange};
use slicemark::{Tool, Viewer};

const TONE_STEP: f32 = 0.05;

pub fn toolbar(viewer: &Viewer, dirty: bool) -> Element<'_, Message> {
    let has_stack = !viewer.stack().is_empty();

    let save_label = if dirty { "Save Document *" } else { "Save Document" };
    let file_row = row![
        button("Open Images").on_press(Message::OpenImages),
        button("Open Document").on_press(Message::OpenDocument),
        button(save_label).on_press_maybe(has_stack.then_some(Message::SaveDocument)),
        button("Undo").on_press_maybe(viewer.can_undo().then_some(Message::Undo)),
        button("Redo").on_press_maybe(viewer.can_redo().then_some(Message::Redo)),
    ]
    .spacing(8);

    let tools: Vec<(&'static str, Tool)> = Tool::ALL.iter().map(|tool| (tool.label(), *tool)).collect();
    let ranges: Vec<(&'static str, PropagationRange)> = PropagationRange::ALL
        .iter()
        .map(|range| (range.label(), *range))
        .collect();

    let drawing_row = row![
        segmented_toggle(&tools, viewer.tool(), Message::SelectTool).width(Length::FillPortion(3)),
        segmented_toggle(&ranges, viewer.propagation(), Message::SetPropagation)
            .width(Length::FillPortion(3)),
        pick_list(
            Category::ALL,
            Some(viewer.draw_category()),
            Message::SetDrawCategory
        )
        .width(Length::FillPortion(1)),
    ]
    .spacing(12)
    .align_y(Alignment::Center);

    let tone = viewer.tone();
    let presentation = viewer.stack().presentation();
    let adjust_row = row![
        button("⟲").on_press(Message::RotateCounterClockwise),
        button("⟳").on_press(Message::RotateClockwise),
        button(if presentation.flip_horizontal { "Unflip" } else { "Flip" })
            .on_press(Message::ToggleFlip),
        text(format!("{}°", presentation.rotation.degrees())).width(Length::Fixed(40.0)),
        text("Brightness"),
        slider(0.0..=2.0, tone.brightness as f32, Message::SetBrightness)
            .step(TONE_STEP)
            .width(Length::Fixed(120.0)),
        text(percent(tone.brightness)).width(Length::Fixed(48.0)),
        text("Contrast"),
        slider(0.0..=2.0, tone.contrast as f32, Message::SetContrast)
            .step(TONE_STEP)
            .width(Length::Fixed(120.0)),
        text(percent(tone.contrast)).width(Length::Fixed(48.0)),
        button("Reset").on_press(Message::ResetAdjustments),
        checkbox("Magnet", viewer.magnet()).on_toggle(Message::SetMagnet),
        checkbox("Drags propagate", viewer.propagate_drags()).on_toggle(Message::SetPropagateDrags),
    ]
    .spacing(10)
    .align_y(Alignment::Center);

    let len = viewer.stack().len();
    let mut slice_row = row![text(slice_position(viewer.current_slice(), len)).width(Length::Fixed(120.0))]
        .spacing(12)
        .align_y(Alignment::Center);
    slice_row = slice_row.push(
        button("Reverse Order").on_press_maybe((len > 1).then_some(Message::ReverseSlices)),
    );
    slice_row = slice_row.push(
        button("Remove Slice").on_press_maybe(has_stack.then_some(Message::RemoveCurrentSlice)),
    );
    if len > 1 {
        slice_row = slice_row.push(slider(
            0..=(len - 1) as u32,
            viewer.current_slice() as u32,
            Message::SetSlice,
        ));
    }

    column![file_row, drawing_row, adjust_row, slice_row]
        .spacing(10)
        .into()
}
