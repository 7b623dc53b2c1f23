use crate::image_pipeline::RasterPipeline;
use crate::message::{CanvasEvent, LoadedDocument, Message, Shortcut, TextField};
use crate::views::{structure_panel, toolbar, viewport_canvas};
use iced::keyboard::{self, key, Key};
use iced::widget::image::Handle;
use iced::widget::text::Wrapping;
use iced::widget::{column, container, row, text};
use iced::{application, Element, Length, Subscription, Task, Theme};
use rfd::AsyncFileDialog;
use slicemark::model::{AnnotationUpdate, DeleteScope, SliceId, Stack, StackDocument};
use slicemark::raster::Tone;
use slicemark::transform::Presentation;
use slicemark::{Viewer, ViewerConfig};
use std::cell::{Cell, RefCell};
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;

const APP_TITLE: &str = "Slicemark";
const DOCUMENT_EXTENSIONS: [&str; 1] = ["json"];
const IMAGE_EXTENSIONS: [&str; 4] = ["dcm", "png", "jpg", "jpeg"];

pub fn run() -> iced::Result {
    let _ = env_logger::Builder::from_default_env()
        .format_timestamp_secs()
        .try_init();

    application(APP_TITLE, App::update, App::view)
        .theme(App::theme)
        .subscription(App::subscription)
        .run_with(App::new)
}

/// Identifies what the cached texture was rendered from.
#[derive(Debug, Clone, Copy, PartialEq)]
struct TextureKey {
    generation: u64,
    slice: Option<SliceId>,
    presentation: Presentation,
    tone: Tone,
}

struct Texture {
    key: TextureKey,
    handle: Handle,
}

pub struct App {
    viewer: Viewer,
    /// Host copy of the stack document, kept current from viewer patches.
    document: Rc<RefCell<StackDocument>>,
    dirty: Rc<Cell<bool>>,
    document_path: Option<PathBuf>,
    base_dir: Option<PathBuf>,
    /// Bumped per loaded stack so late decodes of an old stack are dropped.
    generation: u64,
    texture: Option<Texture>,
    last_error: Option<String>,
}

impl App {
    pub fn new() -> (Self, Task<Message>) {
        let document = Rc::new(RefCell::new(StackDocument::default()));
        let dirty = Rc::new(Cell::new(false));

        let mut viewer = Viewer::new(Stack::default(), ViewerConfig::from_env());
        {
            let document = Rc::clone(&document);
            let dirty = Rc::clone(&dirty);
            viewer.set_on_update(move |patch| {
                patch.apply_to(&mut document.borrow_mut());
                dirty.set(true);
            });
        }
        viewer.set_on_slice_change(|index| log::debug!("current slice is now {index}"));

        let app = Self {
            viewer,
            document,
            dirty,
            document_path: None,
            base_dir: None,
            generation: 0,
            texture: None,
            last_error: None,
        };

        let paths: Vec<PathBuf> = std::env::args_os().skip(1).map(PathBuf::from).collect();
        let task = if paths.is_empty() {
            Task::none()
        } else {
            Task::done(Message::ImagesPicked(paths))
        };
        (app, task)
    }

    pub fn update(&mut self, message: Message) -> Task<Message> {
        let task = match message {
            Message::OpenImages => Task::perform(
                async {
                    match AsyncFileDialog::new()
                        .add_filter("Images", &IMAGE_EXTENSIONS)
                        .pick_files()
                        .await
                    {
                        Some(handles) => handles
                            .into_iter()
                            .map(|handle| handle.path().to_path_buf())
                            .collect(),
                        None => Vec::new(),
                    }
                },
                Message::ImagesPicked,
            ),
            Message::ImagesPicked(mut paths) => {
                if paths.is_empty() {
                    return Task::none();
                }
                paths.sort();
                Task::perform(
                    async move { RasterPipeline::expand_sources(&paths) },
                    Message::SourcesResolved,
                )
            }
            Message::SourcesResolved(sources) => {
                self.document_path = None;
                self.load_stack(Stack::new(sources), None)
            }
            Message::OpenDocument => Task::perform(
                async {
                    let handle = AsyncFileDialog::new()
                        .add_filter("Stack document", &DOCUMENT_EXTENSIONS)
                        .pick_file()
                        .await?;
                    Some(read_document(handle.path().to_path_buf()))
                },
                Message::DocumentLoaded,
            ),
            Message::DocumentLoaded(None) => Task::none(),
            Message::DocumentLoaded(Some(Err(err))) => {
                self.last_error = Some(err);
                Task::none()
            }
            Message::DocumentLoaded(Some(Ok(loaded))) => match Stack::from_document(&loaded.document) {
                Ok(stack) => {
                    let base_dir = loaded.path.parent().map(PathBuf::from);
                    self.document_path = Some(loaded.path);
                    self.last_error = None;
                    self.load_stack(stack, base_dir)
                }
                Err(err) => {
                    self.last_error = Some(format!("{}: {err}", loaded.path.display()));
                    Task::none()
                }
            },
            Message::SaveDocument => self.save_document(),
            Message::DocumentSaved(None) => Task::none(),
            Message::DocumentSaved(Some(Ok(path))) => {
                log::info!("saved stack document to {}", path.display());
                self.document_path = Some(path);
                self.dirty.set(false);
                Task::none()
            }
            Message::DocumentSaved(Some(Err(err))) => {
                self.last_error = Some(err);
                Task::none()
            }
            Message::SliceDecoded {
                generation,
                slice,
                result,
            } => {
                if generation != self.generation {
                    log::debug!("dropping decode of slice {} from an earlier stack", slice.0);
                    return Task::none();
                }
                // Slices may have been reordered or removed while decoding.
                let Some(index) = self.viewer.stack().index_of(slice) else {
                    log::debug!("dropping decode of removed slice {}", slice.0);
                    return Task::none();
                };
                match result {
                    Ok(raster) => {
                        self.viewer.set_raster_ready(index, raster);
                        self.record_natural_size();
                    }
                    Err(err) => self.viewer.set_raster_failed(index, err),
                }
                Task::none()
            }
            Message::Canvas(size, event) => {
                self.viewer.set_container_size(size);
                match event {
                    CanvasEvent::Pressed(pointer) => self.viewer.pointer_down(pointer),
                    CanvasEvent::Moved(position) => self.viewer.pointer_move(position),
                    CanvasEvent::Released => self.viewer.pointer_up(),
                    CanvasEvent::Wheel(wheel) => self.viewer.wheel(wheel),
                }
                Task::none()
            }
            Message::SelectTool(tool) => {
                self.viewer.set_tool(tool);
                Task::none()
            }
            Message::SetPropagation(range) => {
                self.viewer.set_propagation(range);
                Task::none()
            }
            Message::SetDrawCategory(category) => {
                self.viewer.set_draw_category(category);
                Task::none()
            }
            Message::SetMagnet(enabled) => {
                self.viewer.set_magnet(enabled);
                Task::none()
            }
            Message::SetPropagateDrags(enabled) => {
                self.viewer.set_propagate_drags(enabled);
                Task::none()
            }
            Message::SetSlice(index) => {
                self.viewer.set_current_slice(index as usize);
                Task::none()
            }
            Message::ReverseSlices => {
                self.viewer.reverse_slices();
                Task::none()
            }
            Message::RemoveCurrentSlice => {
                let index = self.viewer.current_slice();
                self.viewer.remove_slice(index);
                Task::none()
            }
                        Message::RotateClockwise => {
                self.viewer.rotate_clockwise();
                Task::none()
            }
            Message::RotateCounterClockwise => {
                self.viewer.rotate_counter_clockwise();
                Task::none()
            }
            Message::ToggleFlip => {
                self.viewer.toggle_flip();
                Task::none()
            }
            Message::SetBrightness(value) => {
                self.viewer.set_brightness(value as f64);
                Task::none()
            }
            Message::SetContrast(value) => {
                self.viewer.set_contrast(value as f64);
                Task::none()
            }
            Message::ResetAdjustments => {
                self.viewer.reset_adjustments();
                Task::none()
            }
            Message::Undo => {
                self.viewer.undo();
                Task::none()
            }
            Message::Redo => {
                self.viewer.redo();
                Task::none()
            }
            Message::Select(target) => {
                self.viewer.select(Some(target));
                Task::none()
            }
            Message::Delete(scope) => {
                self.viewer.delete_selection(scope);
                Task::none()
            }
            Message::EditField(field, value) => {
                self.edit_selection(field_update(field, value));
                Task::none()
            }
            Message::EditCategory(category) => {
                self.edit_selection(AnnotationUpdate::category(category));
                Task::none()
            }
            Message::SetCategoryVisible(category, visible) => {
                self.viewer.set_category_visible(category, visible);
                Task::none()
            }
            Message::Shortcut(shortcut) => {
                self.apply_shortcut(shortcut);
                Task::none()
            }
        };

        self.refresh_texture();
        task
    }

    pub fn view(&self) -> Element<'_, Message> {
        let canvas = container(viewport_canvas(
            &self.viewer,
            self.texture.as_ref().map(|texture| &texture.handle),
        ))
        .width(Length::FillPortion(4))
        .height(Length::Fill);

        let panel = container(structure_panel(&self.viewer))
            .padding(16)
            .width(Length::FillPortion(1))
            .height(Length::Fill);

        let mut content = column![
            toolbar(&self.viewer, self.dirty.get()),
            row![canvas, panel]
                .spacing(16)
                .width(Length::Fill)
                .height(Length::Fill),
        ]
        .spacing(16);

        if let Some(error) = &self.last_error {
            content = content.push(text(error).size(16).wrapping(Wrapping::Word));
        }

        container(content).padding(20).into()
    }

    pub fn theme(&self) -> Theme {
        Theme::Dark
    }

    pub fn subscription(&self) -> Subscription<Message> {
        keyboard::on_key_press(shortcut_for)
    }

    /// Installs a new stack and queues one decode per slice.
    fn load_stack(&mut self, stack: Stack, base_dir: Option<PathBuf>) -> Task<Message> {
        self.generation += 1;
        let generation = self.generation;

        *self.document.borrow_mut() = stack.to_document();
        self.dirty.set(false);
        self.base_dir = base_dir;
        self.texture = None;

        let sources: Vec<(SliceId, String)> = stack
            .slices()
            .iter()
            .map(|slice| (slice.id, slice.source.clone()))
            .collect();
        self.viewer.replace_stack(stack);

        let mut decodes = Vec::with_capacity(sources.len());
        for (index, (slice, source)) in sources.into_iter().enumerate() {
            self.viewer.set_raster_pending(index);
            let base = self.base_dir.clone();
            decodes.push(Task::perform(
                async move {
                    RasterPipeline::decode_source(&source, base.as_deref())
                        .map(Arc::new)
                        .map_err(|err| err.to_string())
                },
                move |result| Message::SliceDecoded {
                    generation,
                    slice,
                    result,
                },
            ));
        }
        Task::batch(decodes)
    }

    fn save_document(&mut self) -> Task<Message> {
        let json = match self.document.borrow().to_json_pretty() {
            Ok(json) => json,
            Err(err) => {
                self.last_error = Some(err.to_string());
                return Task::none();
            }
        };
        let known = self.document_path.clone();

        Task::perform(
            async move {
                let path = match known {
                    Some(path) => path,
                    None => AsyncFileDialog::new()
                        .add_filter("Stack document", &DOCUMENT_EXTENSIONS)
                        .set_file_name("stack.json")
                        .save_file()
                        .await?
                        .path()
                        .to_path_buf(),
                };
                Some(
                    std::fs::write(&path, json)
                        .map(|()| path.clone())
                        .map_err(|err| format!("{}: {err}", path.display())),
                )
            },
            Message::DocumentSaved,
        )
    }

    /// Copies the natural size the first decoded raster established into
    /// the host document, which has no size of its own for fresh stacks.
    fn record_natural_size(&mut self) {
        let Some(size) = self.viewer.stack().natural_size() else {
            return;
        };
        let mut document = self.document.borrow_mut();
        if document.natural_width.is_none() || document.natural_height.is_none() {
            document.natural_width = Some(size.width);
            document.natural_height = Some(size.height);
            self.dirty.set(true);
        }
    }

    fn edit_selection(&mut self, update: AnnotationUpdate) {
        if let Some(target) = self.viewer.selection() {
            self.viewer.update_annotation(target, &update);
        }
    }

    fn apply_shortcut(&mut self, shortcut: Shortcut) {
        match shortcut {
            Shortcut::Cancel => self.viewer.cancel_transient(),
            Shortcut::DeleteSelection => {
                self.viewer.delete_selection(DeleteScope::Current);
            }
            Shortcut::FinishPolygon => {
                self.viewer.finish_polygon();
            }
            Shortcut::NextSlice => self.viewer.step_slice(1),
            Shortcut::PreviousSlice => self.viewer.step_slice(-1),
            Shortcut::Undo => {
                self.viewer.undo();
            }
            Shortcut::Redo => {
                self.viewer.redo();
            }
        }
    }

    /// Re-renders the slice texture when the slice, orientation or tone
    /// it was built from has changed.
    fn refresh_texture(&mut self) {
        let Some(raster) = self.viewer.current_raster() else {
            self.texture = None;
            return;
        };
        let key = TextureKey {
            generation: self.generation,
            slice: self.viewer.stack().slice_id(self.viewer.current_slice()),
            presentation: self.viewer.stack().presentation(),
            tone: self.viewer.tone(),
        };
        if self.texture.as_ref().is_some_and(|texture| texture.key == key) {
            return;
        }
        let (width, height, pixels) = raster.render_rgba(key.presentation, key.tone);
        self.texture = Some(Texture {
            key,
            handle: Handle::from_rgba(width, height, pixels),
        });
    }
}

fn read_document(path: PathBuf) -> Result<LoadedDocument, String> {
    let raw = std::fs::read_to_string(&path).map_err(|err| format!("{}: {err}", path.display()))?;
    let document =
        StackDocument::from_json(&raw).map_err(|err| format!("{}: {err}", path.display()))?;
    Ok(LoadedDocument { path, document })
}

fn field_update(field: TextField, value: String) -> AnnotationUpdate {
    let mut update = AnnotationUpdate::default();
    match field {
        TextField::Label => return AnnotationUpdate::label(value),
        TextField::LabelEn => update.label_en = Some(value),
        TextField::Description => update.description = Some(value),
        TextField::DescriptionEn => update.description_en = Some(value),
    }
    update
}

fn shortcut_for(key: Key, modifiers: keyboard::Modifiers) -> Option<Message> {
    let shortcut = match key.as_ref() {
        Key::Named(key::Named::Escape) => Shortcut::Cancel,
        Key::Named(key::Named::Delete | key::Named::Backspace) => Shortcut::DeleteSelection,
        Key::Named(key::Named::Enter) => Shortcut::FinishPolygon,
        Key::Named(key::Named::ArrowRight | key::Named::ArrowDown) => Shortcut::NextSlice,
        Key::Named(key::Named::ArrowLeft | key::Named::ArrowUp) => Shortcut::PreviousSlice,
        Key::Character("z") if modifiers.command() && modifiers.shift() => Shortcut::Redo,
        Key::Character("z") if modifiers.command() => Shortcut::Undo,
        Key::Character("y") if modifiers.command() => Shortcut::Redo,
        _ => return None,
    };
    Some(Message::Shortcut(shortcut))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shortcuts_map_keys() {
        let none = keyboard::Modifiers::default();
        let assert_shortcut = |key: Key, modifiers, expected: Shortcut| {
            match shortcut_for(key, modifiers) {
                Some(Message::Shortcut(found)) => assert_eq!(found, expected),
                other => panic!("expected {expected:?}, got {other:?}"),
            }
        };
        assert_shortcut(Key::Named(key::Named::Escape), none, Shortcut::Cancel);
        assert_shortcut(Key::Named(key::Named::ArrowDown), none, Shortcut::NextSlice);
        assert_shortcut(Key::Character("z".into()), keyboard::Modifiers::CTRL, Shortcut::Undo);
        assert_shortcut(
            Key::Character("z".into()),
            keyboard::Modifiers::CTRL | keyboard::Modifiers::SHIFT,
            Shortcut::Redo,
        );
        assert!(shortcut_for(Key::Character("z".into()), none).is_none());
    }

    #[test]
    fn field_updates_touch_one_field() {
        let update = field_update(TextField::DescriptionEn, String::from("Femoral head"));
        assert_eq!(update.description_en.as_deref(), Some("Femoral head"));
        assert!(update.label.is_none());
        assert!(!update.is_spatial());
        assert!(update.has_metadata());

        let label = field_update(TextField::Label, String::from("Node"));
        assert_eq!(label, AnnotationUpdate::label("Node"));
    }
}
