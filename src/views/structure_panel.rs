use crate::message::{Message, TextField};
use crate::utils::{annotation_title, slice_runs};
use iced::widget::text::Wrapping;
use iced::widget::{button, checkbox, column, pick_list, row, scrollable, text, text_input, Column};
use iced::{Element, Length};
use slicemark::model::{AnnotationRef, Category, DeleteScope};
use slicemark::Viewer;

/// Annotation list for the current slice, category visibility, and an
/// editor for the selected annotation.
pub fn structure_panel(viewer: &Viewer) -> Element<'_, Message> {
    let mut list = column![text("Annotations").size(20)].spacing(6);

    let annotations = viewer.visible_annotations();
    if annotations.is_empty() {
        list = list.push(text("Nothing drawn on this slice"));
    }
    for annotation in annotations {
        let title = annotation_title(
            annotation.target,
            annotation.shape.kind(),
            &annotation.text.label,
        );
        let label = if viewer.selection() == Some(annotation.target) {
            format!("▶ {title}")
        } else {
            title
        };
        list = list.push(
            button(text(label).wrapping(Wrapping::Word).width(Length::Fill))
                .on_press(Message::Select(annotation.target))
                .width(Length::Fill),
        );
    }

    let mut visibility = column![text("Show").size(16)].spacing(4);
    for category in Category::ALL {
        visibility = visibility.push(
            checkbox(category.label(), viewer.is_category_visible(category))
                .on_toggle(move |visible| Message::SetCategoryVisible(category, visible)),
        );
    }

    let mut content = column![list, visibility].spacing(16);
    if let Some(target) = viewer.selection() {
        if let Some(editor) = selection_editor(viewer, target) {
            content = content.push(editor);
        }
    }

    scrollable(content).height(Length::Fill).into()
}

fn selection_editor(viewer: &Viewer, target: AnnotationRef) -> Option<Column<'_, Message>> {
    let (category, kind, annotation_text) = viewer.stack().annotation_meta(target)?;

    let placement = match target {
        AnnotationRef::Structure(id) => {
            let indices = viewer.stack().location_indices(id);
            format!("{} on slices {}", kind.as_str(), slice_runs(&indices))
        }
        AnnotationRef::Legacy { .. } => format!("{} on this slice only", kind.as_str()),
    };

    let field = |placeholder: &'static str, value: &str, field: TextField| {
        text_input(placeholder, value).on_input(move |value| Message::EditField(field, value))
    };

    let mut deletes = row![].spacing(6);
    let scopes: &[DeleteScope] = match target {
        AnnotationRef::Structure(_) => &[DeleteScope::Current, DeleteScope::Forward, DeleteScope::All],
        AnnotationRef::Legacy { .. } => &[DeleteScope::Current],
    };
    for scope in scopes {
        deletes = deletes.push(button(text(scope.label()).size(13)).on_press(Message::Delete(*scope)));
    }

    Some(
        column![
            text("Selected").size(16),
            text(placement).wrapping(Wrapping::Word),
            pick_list(Category::ALL, Some(category), Message::EditCategory),
            field("Label", &annotation_text.label, TextField::Label),
            field("Label (English)", &annotation_text.label_en, TextField::LabelEn),
            field("Description", &annotation_text.description, TextField::Description),
            field(
                "Description (English)",
                &annotation_text.description_en,
                TextField::DescriptionEn
            ),
            deletes,
        ]
        .spacing(8),
    )
}
