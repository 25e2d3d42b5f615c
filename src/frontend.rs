use crate::motion::{
    anchor_target, CarouselDriver, ElementMetrics, PageSurface, ScrollReactor, Viewport,
    ANCHOR_SCROLL_OFFSET, PARTNER_TRACK_ID,
};
use crate::stats::{SocialStats, SOCIAL_STATS_PATH};
use gloo_net::http::Request;
use js_sys::{Array, Function, Object, Reflect};
use std::{cell::RefCell, rc::Rc};
use wasm_bindgen::{closure::Closure, JsCast, JsValue};
use wasm_bindgen_futures::spawn_local;
use web_sys::{
    console, window, Document, DocumentReadyState, Element, Event, HtmlElement,
    IntersectionObserver, IntersectionObserverEntry, IntersectionObserverInit, ScrollBehavior,
    ScrollToOptions, Window,
};

const LENIS_LERP: f64 = 0.12;
const COLLAB_CARD_SELECTOR: &str = ".collab-card";
const COLLAB_CARD_VISIBLE_CLASS: &str = "collab-card-visible";
const COLLAB_CARD_THRESHOLD: f64 = 0.25;
const ANCHOR_LINK_SELECTOR: &str = "a[href^=\"#\"]";

fn log_error(message: &str) {
    console::error_1(&JsValue::from_str(message));
}

fn viewport_size(win: &Window) -> Viewport {
    let width = win
        .inner_width()
        .ok()
        .and_then(|value| value.as_f64())
        .unwrap_or(1280.0);
    let height = win
        .inner_height()
        .ok()
        .and_then(|value| value.as_f64())
        .unwrap_or(720.0);

    Viewport { width, height }
}

/// `PageSurface` over the live document.
struct DomPage {
    window: Window,
    document: Document,
}

impl DomPage {
    fn element(&self, id: &str) -> Option<Element> {
        self.document.get_element_by_id(id)
    }

    fn html_element(&self, id: &str) -> Option<HtmlElement> {
        self.element(id)?.dyn_into::<HtmlElement>().ok()
    }
}

impl PageSurface for DomPage {
    fn element_metrics(&self, id: &str) -> Option<ElementMetrics> {
        let element = self.html_element(id)?;
        Some(ElementMetrics {
            top: f64::from(element.offset_top()),
            height: f64::from(element.offset_height()),
        })
    }

    fn viewport(&self) -> Viewport {
        viewport_size(&self.window)
    }

    fn set_style_property(&self, id: &str, name: &str, value: &str) {
        if let Some(element) = self.html_element(id) {
            let _ = element.style().set_property(name, value);
        }
    }

    fn set_class(&self, id: &str, class: &str, enabled: bool) {
        if let Some(element) = self.element(id) {
            let _ = element.class_list().toggle_with_force(class, enabled);
        }
    }

    fn duplicate_children(&self, id: &str) -> Option<usize> {
        let track = self.element(id)?;
        let children = track.children();
        let originals: Vec<Element> = (0..children.length())
            .filter_map(|index| children.item(index))
            .collect();

        for child in &originals {
            if let Ok(clone) = child.clone_node_with_deep(true) {
                let _ = track.append_child(&clone);
            }
        }

        Some(originals.len())
    }

    fn child_widths(&self, id: &str, count: usize) -> Vec<f64> {
        let Some(track) = self.element(id) else {
            return Vec::new();
        };
        let children = track.children();

        (0..children.length())
            .take(count)
            .filter_map(|index| children.item(index))
            .map(|child| child.get_bounding_client_rect().width())
            .collect()
    }
}

/// Handle to the page's Lenis instance, loaded from a separate script tag.
struct Lenis {
    instance: JsValue,
}

impl Lenis {
    fn create(win: &Window) -> Option<Self> {
        let constructor = Reflect::get(win, &JsValue::from_str("Lenis"))
            .ok()?
            .dyn_into::<Function>()
            .ok()?;

        let options = Object::new();
        Reflect::set(&options, &JsValue::from_str("lerp"), &JsValue::from_f64(LENIS_LERP)).ok()?;
        Reflect::set(&options, &JsValue::from_str("smoothWheel"), &JsValue::TRUE).ok()?;
        Reflect::set(&options, &JsValue::from_str("smoothTouch"), &JsValue::TRUE).ok()?;

        let instance = Reflect::construct(&constructor, &Array::of1(&options)).ok()?;
        Some(Self { instance })
    }

    fn call(&self, method: &str, args: &Array) -> Result<JsValue, JsValue> {
        let method = Reflect::get(&self.instance, &JsValue::from_str(method))?.dyn_into::<Function>()?;
        Reflect::apply(&method, &self.instance, args)
    }

    fn raf(&self, time: f64) {
        let _ = self.call("raf", &Array::of1(&JsValue::from_f64(time)));
    }

    fn on_scroll(&self, mut handler: impl FnMut(f64) + 'static) {
        let callback = Closure::<dyn FnMut(JsValue)>::new(move |event: JsValue| {
            let scroll = Reflect::get(&event, &JsValue::from_str("scroll"))
                .ok()
                .and_then(|value| value.as_f64());
            if let Some(scroll) = scroll {
                handler(scroll);
            }
        });

        if self
            .call(
                "on",
                &Array::of2(&JsValue::from_str("scroll"), callback.as_ref()),
            )
            .is_err()
        {
            log_error("lenis scroll subscription failed");
        }
        callback.forget();
    }

    fn scroll_to(&self, target: &Element, offset: f64) {
        let options = Object::new();
        let _ = Reflect::set(&options, &JsValue::from_str("offset"), &JsValue::from_f64(offset));
        let _ = self.call("scrollTo", &Array::of2(target, &options));
    }
}

/// Smooth scrolling through Lenis when the page loaded it, otherwise through
/// the browser's own scroll events and `scrollTo`.
#[derive(Clone)]
enum SmoothScroller {
    Lenis(Rc<Lenis>),
    Native(Window),
}

impl SmoothScroller {
    fn create(win: &Window) -> Self {
        match Lenis::create(win) {
            Some(lenis) => Self::Lenis(Rc::new(lenis)),
            None => Self::Native(win.clone()),
        }
    }

    fn on_scroll(&self, mut handler: impl FnMut(f64) + 'static) {
        match self {
            Self::Lenis(lenis) => lenis.on_scroll(handler),
            Self::Native(win) => {
                let source = win.clone();
                let callback = Closure::<dyn FnMut()>::new(move || {
                    if let Ok(scroll) = source.scroll_y() {
                        handler(scroll);
                    }
                });
                let _ = win
                    .add_event_listener_with_callback("scroll", callback.as_ref().unchecked_ref());
                callback.forget();
            }
        }
    }

    fn scroll_to(&self, target: &Element, offset: f64) {
        match self {
            Self::Lenis(lenis) => lenis.scroll_to(target, offset),
            Self::Native(win) => {
                let current = win.scroll_y().unwrap_or(0.0);
                let options = ScrollToOptions::new();
                options.set_top(target.get_bounding_client_rect().top() + current + offset);
                options.set_behavior(ScrollBehavior::Smooth);
                win.scroll_to_with_scroll_to_options(&options);
            }
        }
    }
}

fn request_frame(callback: &Closure<dyn FnMut(f64)>) {
    if let Some(win) = window() {
        let _ = win.request_animation_frame(callback.as_ref().unchecked_ref());
    }
}

/// Subscribes `tick` to every animation frame for the lifetime of the page.
fn every_frame(mut tick: impl FnMut(f64) + 'static) {
    let slot: Rc<RefCell<Option<Closure<dyn FnMut(f64)>>>> = Rc::new(RefCell::new(None));
    let next = slot.clone();

    *slot.borrow_mut() = Some(Closure::<dyn FnMut(f64)>::new(move |time: f64| {
        tick(time);
        if let Some(callback) = next.borrow().as_ref() {
            request_frame(callback);
        }
    }));

    if let Some(callback) = slot.borrow().as_ref() {
        request_frame(callback);
    }
}

fn bind_anchor_links(document: &Document, scroller: &SmoothScroller) {
    let Ok(links) = document.query_selector_all(ANCHOR_LINK_SELECTOR) else {
        return;
    };

    for index in 0..links.length() {
        let Some(link) = links.item(index).and_then(|node| node.dyn_into::<Element>().ok()) else {
            continue;
        };

        let document = document.clone();
        let scroller = scroller.clone();
        let source = link.clone();
        let onclick = Closure::<dyn FnMut(Event)>::new(move |event: Event| {
            let href = source.get_attribute("href");
            let Some(selector) = anchor_target(href.as_deref()) else {
                return;
            };
            let Ok(Some(target)) = document.query_selector(selector) else {
                return;
            };

            event.prevent_default();
            scroller.scroll_to(&target, ANCHOR_SCROLL_OFFSET);
        });

        let _ = link.add_event_listener_with_callback("click", onclick.as_ref().unchecked_ref());
        onclick.forget();
    }
}

fn start_scroll_reactor(page: Rc<DomPage>, scroller: &SmoothScroller) {
    let mut reactor = ScrollReactor::new(&*page);
    scroller.on_scroll(move |scroll| {
        reactor.on_scroll(&*page, scroll);
    });
}

fn observe_collab_cards(document: &Document) {
    let Ok(cards) = document.query_selector_all(COLLAB_CARD_SELECTOR) else {
        return;
    };
    if cards.length() == 0 {
        return;
    }

    let callback = Closure::<dyn FnMut(Array, IntersectionObserver)>::new(
        |entries: Array, _observer: IntersectionObserver| {
            for entry in entries.iter() {
                let Ok(entry) = entry.dyn_into::<IntersectionObserverEntry>() else {
                    continue;
                };
                let _ = entry
                    .target()
                    .class_list()
                    .toggle_with_force(COLLAB_CARD_VISIBLE_CLASS, entry.is_intersecting());
            }
        },
    );

    let options = IntersectionObserverInit::new();
    options.set_threshold(&JsValue::from_f64(COLLAB_CARD_THRESHOLD));
    let observer =
        match IntersectionObserver::new_with_options(callback.as_ref().unchecked_ref(), &options) {
            Ok(observer) => observer,
            Err(_) => {
                log_error("collab card observer unavailable");
                return;
            }
        };
    callback.forget();

    for index in 0..cards.length() {
        if let Some(card) = cards.item(index).and_then(|node| node.dyn_into::<Element>().ok()) {
            observer.observe(&card);
        }
    }
}

fn start_carousel(page: Rc<DomPage>) {
    let Some(driver) = CarouselDriver::mount(&*page, PARTNER_TRACK_ID) else {
        return;
    };
    let driver = Rc::new(RefCell::new(driver));

    let on_resize = {
        let page = page.clone();
        let driver = driver.clone();
        Closure::<dyn FnMut()>::new(move || driver.borrow_mut().measure(&*page))
    };
    let _ = page
        .window
        .add_event_listener_with_callback("resize", on_resize.as_ref().unchecked_ref());
    on_resize.forget();

    if let Some(track) = page.element(PARTNER_TRACK_ID) {
        for (event, paused) in [("mouseenter", true), ("mouseleave", false)] {
            let driver = driver.clone();
            let on_hover = Closure::<dyn FnMut()>::new(move || driver.borrow_mut().set_paused(paused));
            let _ = track.add_event_listener_with_callback(event, on_hover.as_ref().unchecked_ref());
            on_hover.forget();
        }
    }

    every_frame(move |_| driver.borrow_mut().frame(&*page));
}

/// Fetches the proxy once and hands the counts to the counter elements.
/// Resolves to whether fresh stats reached the page; a non-OK response leaves
/// the static placeholders in place.
async fn load_social_stats(document: &Document) -> Result<bool, gloo_net::Error> {
    let response = Request::get(SOCIAL_STATS_PATH).send().await?;
    if !response.ok() {
        return Ok(false);
    }

    let stats = response.json::<SocialStats>().await?;

    for (key, value) in stats.stat_targets() {
        let selector = format!(".stat-number[data-stat=\"{key}\"]");
        let Ok(Some(element)) = document.query_selector(&selector) else {
            continue;
        };
        if let Some(element) = element.dyn_ref::<HtmlElement>() {
            let _ = element.dataset().set("target", &value);
        }
    }

    Ok(true)
}

fn start_page(win: Window, document: Document) {
    let page = Rc::new(DomPage {
        window: win.clone(),
        document: document.clone(),
    });
    let scroller = SmoothScroller::create(&win);

    if let SmoothScroller::Lenis(lenis) = &scroller {
        let lenis = lenis.clone();
        every_frame(move |time| lenis.raf(time));
    }

    bind_anchor_links(&document, &scroller);
    start_scroll_reactor(page.clone(), &scroller);
    observe_collab_cards(&document);
    start_carousel(page);
}

pub fn run() {
    let Some(win) = window() else {
        return;
    };
    let Some(document) = win.document() else {
        return;
    };

    let stats_document = document.clone();
    spawn_local(async move {
        if let Err(error) = load_social_stats(&stats_document).await {
            log_error(&format!("Failed to load social stats: {error}"));
        }
    });

    if document.ready_state() == DocumentReadyState::Loading {
        let ready_window = win.clone();
        let ready_document = document.clone();
        let on_ready = Closure::once_into_js(move || start_page(ready_window, ready_document));
        let _ = document
            .add_event_listener_with_callback("DOMContentLoaded", on_ready.unchecked_ref());
    } else {
        start_page(win, document);
    }
}
