//! XPath locators of the Catastro electronic office and the viewers it links to

use crate::traits::Locator;

// Search page
pub const CONSENT: Locator = Locator::new("cookie consent", "//a[@aria-label='allow cookies']");
pub const CONSENT_FRAME: Locator = Locator::new("consent iframe", "//iframe[@src]");
pub const SEARCH_INPUT: Locator =
    Locator::new("cadastral reference input", "//input[@id='ctl00_Contenido_txtRC2']");
pub const SEARCH_SUBMIT: Locator = Locator::new("DATOS button", "//input[@value='DATOS']");

// Parcel data page
pub const LOCATION: Locator = Locator::new(
    "location",
    "//div[@id='ctl00_Contenido_tblInmueble']//span[text()='Localización']/following-sibling::div//label",
);
pub const CLASS: Locator = Locator::new(
    "class",
    "//div[@id='ctl00_Contenido_tblInmueble']//span[text()='Clase']/following-sibling::*//label",
);
pub const PRIMARY_USE: Locator = Locator::new(
    "primary use",
    "//div[@id='ctl00_Contenido_tblInmueble']//span[text()='Uso principal']/following-sibling::*//label",
);
pub const CULTIVATION: Locator = Locator::new(
    "cultivation",
    "//table[@id='ctl00_Contenido_tblCultivos']//tr[2]//td[2]/span",
);

// Cartography
pub const CARTOGRAPHY_PANEL: Locator =
    Locator::new("cartography panel", "//a[span[@id='ctl00_Contenido_lblCartografia']]");
pub const SHOW_CARTOGRAPHY: Locator =
    Locator::new("show cartography", "//a[span[@id='ctl00_Contenido_lblMostrarCarto']]");
pub const LAYERS_BUTTON: Locator = Locator::new("layers button", "//button[@id='btnCapasC']");
pub const AERIAL_LAYER: Locator = Locator::new("PNOA aerial layer", "//input[@id='aPNOA']");
pub const ZOOM_OUT: Locator = Locator::new("zoom out", "//i[@title='Reducir']");
pub const CANVAS_LOADING: Locator =
    Locator::new("canvas loading indicator", "//div[@id='CargandoImagen']");

// Other viewers page
pub const EXPORT_KML: Locator =
    Locator::new("Google Earth export", "//img[@id='ctl00_Contenido_btnGoogleEarth']");
pub const OPEN_GOOGLE_MAPS: Locator =
    Locator::new("Google Maps viewer", "//input[@id='ctl00_Contenido_ImgBGoogleMaps']");

// Google Maps
pub const MAPS_CONSENT: Locator =
    Locator::new("maps consent", "//button[@aria-label='Aceptar todo']");
pub const MAPS_SEARCH_BOX: Locator =
    Locator::new("maps search box", "//input[contains(@class, 'searchboxinput')]");
