use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use slicemark::model::{AnnotationRef, StructureId};
use slicemark::{
    DeleteScope, Point, PointerEvent, PropagationRange, Raster, Size, Stack, StackDocument, Tool,
    Viewer, ViewerConfig,
};

const SIDE: u32 = 512;

/// Five 512x512 slices shown 1:1, mirroring every patch into a document.
fn five_slice_viewer() -> (Viewer, Rc<RefCell<StackDocument>>) {
    let stack = Stack::new((1..=5).map(|i| format!("slices/{i:03}.png")));
    let document = Rc::new(RefCell::new(stack.to_document()));

    let mut viewer = Viewer::new(stack, ViewerConfig::default());
    let mirror = Rc::clone(&document);
    viewer.set_on_update(move |patch| patch.apply_to(&mut mirror.borrow_mut()));
    viewer.set_container_size(Size::new(SIDE as f64, SIDE as f64));
    for index in 0..5 {
        let raster = Raster::from_gray(SIDE, SIDE, &vec![0; (SIDE * SIDE) as usize]).unwrap();
        viewer.set_raster_ready(index, Arc::new(raster));
    }
    (viewer, document)
}

fn mirrored_slices(document: &Rc<RefCell<StackDocument>>) -> Vec<usize> {
    let document = document.borrow();
    document.structures[0].locations.keys().copied().collect()
}

#[test]
fn forward_from_the_first_slice_then_delete_the_middle() {
    let (mut viewer, document) = five_slice_viewer();
    viewer.set_propagation(PropagationRange::Forward);
    viewer.set_tool(Tool::Point);

    viewer.pointer_down(PointerEvent::primary(Point::new(128.0, 384.0)));
    viewer.pointer_up();

    let id = StructureId(1);
    assert_eq!(viewer.stack().location_indices(id), vec![0, 1, 2, 3, 4]);
    assert_eq!(mirrored_slices(&document), vec![0, 1, 2, 3, 4]);

    viewer.set_current_slice(2);
    assert!(viewer.delete_selection(DeleteScope::Current));
    assert_eq!(viewer.stack().location_indices(id), vec![0, 1, 3, 4]);
    assert_eq!(mirrored_slices(&document), vec![0, 1, 3, 4]);
    {
        let mirrored = document.borrow();
        let shape = &mirrored.structures[0].locations[&4];
        assert!(shape.vertices()[0].distance(Point::new(0.25, 0.75)) < 1e-9);
    }
}

#[test]
fn forward_point_then_local_delete() {
    let (mut viewer, document) = five_slice_viewer();
    viewer.set_current_slice(1);
    viewer.set_propagation(PropagationRange::Forward);
    viewer.set_tool(Tool::Point);

    viewer.pointer_down(PointerEvent::primary(Point::new(256.0, 256.0)));
    viewer.pointer_up();

    let id = StructureId(1);
    assert_eq!(viewer.selection(), Some(AnnotationRef::Structure(id)));
    assert_eq!(viewer.stack().location_indices(id), vec![1, 2, 3, 4]);
    assert_eq!(mirrored_slices(&document), vec![1, 2, 3, 4]);
    {
        let mirrored = document.borrow();
        let shape = &mirrored.structures[0].locations[&1];
        assert!(shape.vertices()[0].distance(Point::new(0.5, 0.5)) < 1e-9);
    }

    viewer.set_current_slice(2);
    assert!(viewer.delete_selection(DeleteScope::Current));
    assert_eq!(viewer.stack().location_indices(id), vec![1, 3, 4]);
    assert_eq!(mirrored_slices(&document), vec![1, 3, 4]);

    let reloaded = Stack::from_document(&document.borrow()).unwrap();
    assert_eq!(reloaded.location_indices(id), vec![1, 3, 4]);
}

#[test]
fn undo_and_redo_replay_through_the_mirror() {
    let (mut viewer, document) = five_slice_viewer();
    viewer.set_propagation(PropagationRange::All);
    viewer.set_current_slice(3);
    let id = viewer
        .create_structure(slicemark::Shape::line(Point::new(0.1, 0.1), Point::new(0.9, 0.9)))
        .unwrap();
    assert_eq!(mirrored_slices(&document), vec![0, 1, 2, 3, 4]);

    viewer.delete_annotation(AnnotationRef::Structure(id), DeleteScope::Forward);
    assert_eq!(mirrored_slices(&document), vec![0, 1, 2]);

    assert!(viewer.undo());
    assert_eq!(mirrored_slices(&document), vec![0, 1, 2, 3, 4]);
    assert!(viewer.redo());
    assert_eq!(mirrored_slices(&document), vec![0, 1, 2]);

    assert!(viewer.undo());
    assert!(viewer.undo());
    assert!(document.borrow().structures.is_empty());
    assert!(!viewer.can_undo());
}

#[test]
fn saved_json_reloads_into_the_same_annotations() {
    let (mut viewer, document) = five_slice_viewer();
    viewer.set_propagation(PropagationRange::Next10);
    viewer.set_tool(Tool::Polygon);
    for (x, y) in [(100.0, 100.0), (300.0, 100.0), (200.0, 300.0)] {
        viewer.pointer_down(PointerEvent::primary(Point::new(x, y)));
        viewer.pointer_up();
    }
    assert!(viewer.finish_polygon());
    viewer.rotate_clockwise();

    let json = document.borrow().to_json_pretty().unwrap();
    let parsed = StackDocument::from_json(&json).unwrap();
    assert_eq!(parsed, *document.borrow());

    let reloaded = Stack::from_document(&parsed).unwrap();
    assert_eq!(reloaded.structures(), viewer.stack().structures());
    assert_eq!(reloaded.presentation(), viewer.stack().presentation());
}
