use gtk::prelude::*;
use gtk::{Application, ApplicationWindow, Image};

use gdk_pixbuf::{Colorspace, InterpType, Pixbuf};
use image::RgbaImage;
use log::warn;
use std::cell::RefCell;
use std::rc::Rc;

use crate::fetch::ArtUpdate;
use crate::scale;

/// The single window: an image widget that tracks the current artwork and
/// rescales it to fill the window without distortion.
pub struct ArtWindow {
    window: ApplicationWindow,
    image: Image,
    pixbuf: Rc<RefCell<Option<Pixbuf>>>,
    last_size: Rc<RefCell<Option<(i32, i32)>>>,
}

impl ArtWindow {
    pub fn new(app: &Application, background_color: &str) -> Self {
        load_css(background_color);

        let window = ApplicationWindow::builder()
            .application(app)
            .title("artbox")
            .default_width(500)
            .default_height(500)
            .build();

        let image = Image::new();
        window.add(&image);

        let this = Self {
            window,
            image,
            pixbuf: Rc::new(RefCell::new(None)),
            last_size: Rc::new(RefCell::new(None)),
        };
        this.connect_resize();
        this
    }

    /// Swap in the artwork handed over by the fetch thread and redraw.
    pub fn apply(&self, update: ArtUpdate) {
        let pixbuf = match update {
            ArtUpdate::Artwork(img) => pixbuf_from_rgba(img),
            ArtUpdate::Clear => None,
        };
        *self.pixbuf.borrow_mut() = pixbuf;

        let size = self.window.size();
        *self.last_size.borrow_mut() = Some(size);
        render(&self.image, self.pixbuf.borrow().as_ref(), size);
    }

    fn connect_resize(&self) {
        let image = self.image.clone();
        let pixbuf = self.pixbuf.clone();
        let last_size = self.last_size.clone();
        // GTK fires size-allocate on plenty of layout events that don't
        // change the window size; only an actual change rescales.
        self.window.connect_size_allocate(move |win, _| {
            let size = win.size();
            if !size_changed(&mut last_size.borrow_mut(), size) {
                return;
            }
            render(&image, pixbuf.borrow().as_ref(), size);
        });
    }

    pub fn show(&self) {
        self.window.show_all();
    }
}

/// Record `size` and report whether it differs from the last observed one.
fn size_changed(last: &mut Option<(i32, i32)>, size: (i32, i32)) -> bool {
    if *last == Some(size) {
        return false;
    }
    *last = Some(size);
    true
}

fn render(image: &Image, pixbuf: Option<&Pixbuf>, (win_w, win_h): (i32, i32)) {
    let Some(pixbuf) = pixbuf else {
        image.clear();
        return;
    };
    let Some((w, h)) = scale::fit(pixbuf.width(), pixbuf.height(), win_w, win_h) else {
        image.clear();
        return;
    };
    match pixbuf.scale_simple(w, h, InterpType::Bilinear) {
        Some(scaled) => image.set_from_pixbuf(Some(&scaled)),
        None => image.clear(),
    }
}

fn pixbuf_from_rgba(img: RgbaImage) -> Option<Pixbuf> {
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return None;
    }
    let rowstride = 4 * width;
    let bytes = glib::Bytes::from_owned(img.into_raw());
    Some(Pixbuf::from_bytes(
        &bytes,
        Colorspace::Rgb,
        true,
        8,
        width as i32,
        height as i32,
        rowstride as i32,
    ))
}

fn load_css(background_color: &str) {
    let provider = gtk::CssProvider::new();
    let css = format!("* {{ background-color: {background_color}; }}");
    if let Err(err) = provider.load_from_data(css.as_bytes()) {
        warn!("invalid background color {background_color:?}: {err}");
        return;
    }
    gtk::StyleContext::add_provider_for_screen(
        &gdk::Screen::default().expect("no default screen"),
        &provider,
        gtk::STYLE_PROVIDER_PRIORITY_APPLICATION,
    );
}
