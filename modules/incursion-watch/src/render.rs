//! Notification text for individual incursions.
//!
//! Every template goes through the same security filter: only incursions
//! whose staging system is at or below the threshold produce a line, and a
//! record with an unresolved staging system produces nothing.

use esi_client::{EsiIncursion, EsiSystem};

pub const QUIET_LISTING: &str = "No Null or Low Sec Incursions... Go Krab!";

const DOTLAN_BASE: &str = "https://evemaps.dotlan.net/map";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Template {
    New,
    Changed,
    Dead,
    Listing,
}

/// Applies the per-line security filter and renders templates.
#[derive(Debug, Clone, Copy)]
pub struct Renderer {
    security_threshold: f32,
}

impl Renderer {
    pub fn new(security_threshold: f32) -> Self {
        Self { security_threshold }
    }

    /// The staging system when the incursion passes the filter.
    fn visible<'a>(&self, incursion: &'a EsiIncursion) -> Option<&'a EsiSystem> {
        incursion
            .staging_system
            .as_ref()
            .filter(|system| system.security_status <= self.security_threshold)
    }

    /// Append one line for `incursion` to `out`. Returns whether a line was written.
    pub fn line(&self, template: Template, incursion: &EsiIncursion, out: &mut String) -> bool {
        let Some(system) = self.visible(incursion) else {
            return false;
        };

        let place = format!(
            "{} {{{:.1}}} {{{} - {}}}",
            system.name, system.security_status, incursion.constellation_name, incursion.region_name
        );
        let jumps = jumps_label(incursion);
        let link = dotlan_url(&incursion.region_name, &incursion.constellation_name);

        let line = match template {
            Template::New => format!(
                "New Incursion detected in {place} - {jumps} jumps from staging - Dotlan: {link}"
            ),
            Template::Changed => format!(
                "Incursion in {place} Changed status to - Status {} - {jumps} jumps from staging - Dotlan: {link}",
                incursion.state
            ),
            Template::Dead => format!("Incursion in {place} Despawned"),
            Template::Listing => format!(
                "{place} Influence: {:.1}% - Status {} - {jumps} jumps from staging - Dotlan: {link}",
                incursion.influence * 100.0,
                incursion.state
            ),
        };
        out.push_str(&line);
        out.push('\n');
        true
    }

    /// On-demand listing of every visible incursion, or the quiet fallback.
    pub fn listing(&self, incursions: &[EsiIncursion]) -> String {
        let mut out = String::new();
        for incursion in incursions {
            self.line(Template::Listing, incursion, &mut out);
        }
        if out.is_empty() {
            out.push_str(QUIET_LISTING);
        }
        out
    }
}

fn jumps_label(incursion: &EsiIncursion) -> String {
    match incursion.jump_count() {
        Some(jumps) => jumps.to_string(),
        None => "?".to_string(),
    }
}

pub fn dotlan_url(region: &str, constellation: &str) -> String {
    format!("{DOTLAN_BASE}/{region}/{constellation}").replace(' ', "_")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn incursion(security: Option<f32>) -> EsiIncursion {
        EsiIncursion {
            constellation_id: 20000607,
            faction_id: 500019,
            staging_solar_system_id: 30004141,
            has_boss: false,
            infested_solar_systems: vec![30004141],
            influence: 0.5,
            state: "established".into(),
            kind: "Incursion".into(),
            constellation_name: "Ohmahailen".into(),
            region_name: "Pure Blind".into(),
            staging_system: security.map(|security_status| EsiSystem {
                system_id: 30004141,
                name: "X-7OMU".into(),
                constellation_id: 20000607,
                security_status,
                security_class: None,
            }),
            route: vec![30000142, 30000144, 30004141],
        }
    }

    #[test]
    fn dotlan_url_replaces_spaces() {
        assert_eq!(
            dotlan_url("Pure Blind", "Ohmahailen"),
            "https://evemaps.dotlan.net/map/Pure_Blind/Ohmahailen"
        );
    }

    #[test]
    fn new_line_includes_place_jumps_and_link() {
        let mut out = String::new();
        assert!(Renderer::new(0.4).line(Template::New, &incursion(Some(-0.3)), &mut out));
        assert_eq!(
            out,
            "New Incursion detected in X-7OMU {-0.3} {Ohmahailen - Pure Blind} - 2 jumps from staging - Dotlan: https://evemaps.dotlan.net/map/Pure_Blind/Ohmahailen\n"
        );
    }

    #[test]
    fn lines_append_to_the_buffer() {
        let renderer = Renderer::new(0.4);
        let inc = incursion(Some(-0.3));
        let mut out = String::new();
        assert!(renderer.line(Template::Dead, &inc, &mut out));
        assert!(renderer.line(Template::Dead, &inc, &mut out));
        let line = "Incursion in X-7OMU {-0.3} {Ohmahailen - Pure Blind} Despawned\n";
        assert_eq!(out, format!("{line}{line}"));
    }

    #[test]
    fn high_sec_is_filtered_from_every_template() {
        let renderer = Renderer::new(0.4);
        let inc = incursion(Some(0.9));
        for template in [Template::New, Template::Changed, Template::Dead, Template::Listing] {
            let mut out = String::new();
            assert!(!renderer.line(template, &inc, &mut out));
            assert!(out.is_empty());
        }
    }

    #[test]
    fn unresolved_staging_system_is_skipped() {
        let mut out = String::new();
        assert!(!Renderer::new(1.0).line(Template::Dead, &incursion(None), &mut out));
        assert!(out.is_empty());
    }

    #[test]
    fn unknown_route_renders_question_mark() {
        let mut inc = incursion(Some(0.1));
        inc.route.clear();
        let mut out = String::new();
        Renderer::new(0.4).line(Template::Changed, &inc, &mut out);
        assert!(out.contains("- ? jumps from staging"));
        assert!(out.contains("Status established"));
    }

    #[test]
    fn listing_falls_back_to_quiet_text() {
        let renderer = Renderer::new(0.4);
        assert_eq!(renderer.listing(&[incursion(Some(0.8))]), QUIET_LISTING);

        let listing = renderer.listing(&[incursion(Some(0.0))]);
        assert!(listing.starts_with("X-7OMU {0.0} {Ohmahailen - Pure Blind} Influence: 50.0%"));
    }
}
