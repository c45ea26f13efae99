use crate::annotations::{Annotations, Thumbnail};
use crate::page::{ElementId, Page, Point};
use crate::rules::{CompiledRule, MatchKind, Rewrite, RewriteContext, RuleId};
use crate::url::{http_prepend, normalize, scheme_prefix_len, strip_hash, strip_scheme};

use super::caption;
use super::images::{Images, get_images, probe_point};
use super::outcome::{FindOutcome, Found, PendingResolve, Probe, TargetDetails};
use super::srcset::{Enlarge, best_srcset_candidate, is_enlargeable, overflow_walk};
use super::{MAX_LOOP_HOPS, RuleEngine};

/// Intermediate result of rule application.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Candidates {
    /// Nothing yet; later fallbacks may still find something.
    Nothing,
    Urls(Vec<String>),
}

/// Outcome of trying the rules against one address.
enum Applied {
    Matched { rule: RuleId, kind: MatchKind, candidates: Candidates },
    /// A `useimg` rule wants the element's image instead: resume the image
    /// fallback at `rule`, using the background when `bg` is set.
    UseImage { rule: RuleId, bg: bool },
    Pending(PendingResolve),
    Declined,
    Broken(FindOutcome),
    Unmatched,
}

fn scheme_less_eq(candidate: &str, addr: &str) -> bool {
    regex!(r"^#?(?:https?:)?//").replace(candidate, "") == addr
}

impl RuleEngine {
    /// Finds media for the probe.
    ///
    /// `pointer` enables the probe for images layered over a link.
    pub fn find(&mut self, page: &dyn Page, annotations: &Annotations, probe: &Probe, pointer: Option<Point>) -> FindOutcome {
        match probe {
            Probe::Element(id) => self.find_element(page, annotations, *id, pointer),
            Probe::Synthetic { href, origin, hops } => self.find_synthetic(page, annotations, href, *origin, *hops),
        }
    }

    // --- Rule application --------------------------------------------------

    /// Surfaces a broken rule once; later matches skip it.
    fn check_broken(&mut self, rule: &CompiledRule) -> Option<Option<FindOutcome>> {
        let err = rule.broken.as_ref()?;
        if self.reported.insert(rule.id) {
            tracing::error!(rule = %rule.name, %err, "rule script failed to compile");
            Some(Some(FindOutcome::CompileError(err.clone())))
        } else {
            Some(None)
        }
    }

    /// Tries every rule against a link address, in order.
    fn apply_link_rules(
        &mut self,
        page: &dyn Page,
        trg: Option<ElementId>,
        href: &str,
        images: &mut Option<Images>,
        origin: ElementId,
    ) -> Applied {
        let addr = strip_scheme(href);
        let prefix = &href[..scheme_prefix_len(href)];
        let scheme = page.scheme();
        let ctx = RewriteContext { page, element: Some(origin), scheme: &scheme };
        let rules = self.rules_arc();

        for rule in rules.iter() {
            let Some(kind) = rule.match_address(addr) else { continue };
            if self.debug_rules {
                tracing::debug!(rule = %rule.name, ?kind, addr, "rule matched");
            }

            if rule.use_img && rule.img.is_some() {
                if let Some(trg) = trg {
                    if images.is_none() {
                        *images = get_images(page, trg);
                    }
                }
                if let (Some(im), Some(re)) = (images.as_ref(), rule.img.as_ref()) {
                    if im.src.as_deref().is_some_and(|s| re.is_match(s)) {
                        return Applied::UseImage { rule: rule.id, bg: false };
                    }
                    if im.bg.as_deref().is_some_and(|s| re.is_match(s)) {
                        return Applied::UseImage { rule: rule.id, bg: true };
                    }
                }
            }

            match self.check_broken(rule) {
                Some(Some(outcome)) => return Applied::Broken(outcome),
                Some(None) => continue,
                None => {}
            }

            if rule.is_async() && (kind == MatchKind::Link || (rule.to.is_empty() && rule.url.is_some())) {
                if strip_hash(page.location().as_str()) == strip_hash(href) {
                    return Applied::Unmatched;
                }
                return match self.pending(rule, kind, addr, href, &ctx, origin) {
                    Some(p) => Applied::Pending(p),
                    None => Applied::Unmatched,
                };
            }

            let candidates = match rule.rewrite(kind, addr, prefix, &ctx) {
                Ok(Rewrite::Urls(urls)) => Candidates::Urls(urls),
                Ok(Rewrite::Empty) => Candidates::Nothing,
                Ok(Rewrite::Null) => return Applied::Declined,
                Err(err) => {
                    tracing::warn!(rule = %rule.name, %err, "rule script failed");
                    Candidates::Nothing
                }
            };

            // A link to the very image being hovered adds nothing.
            let candidates = match (&candidates, trg) {
                (Candidates::Urls(urls), Some(trg)) if urls.len() == 1 => {
                    let own = page.element(trg).and_then(|e| e.attr("src")).map(|s| regex!(r"^https?://").replace(s, ""));
                    let is_anchor = page.element(trg).is_some_and(|e| e.is("a"));
                    if !is_anchor && own.is_some_and(|own| scheme_less_eq(&urls[0], &own)) {
                        Candidates::Nothing
                    } else {
                        candidates
                    }
                }
                _ => candidates,
            };
            return Applied::Matched { rule: rule.id, kind, candidates };
        }
        Applied::Unmatched
    }

    fn pending(
        &self,
        rule: &CompiledRule,
        kind: MatchKind,
        addr: &str,
        full: &str,
        ctx: &RewriteContext<'_>,
        target: ElementId,
    ) -> Option<PendingResolve> {
        let url = match rule.request_url(kind, addr, ctx) {
            Ok(url) => url,
            Err(err) => {
                tracing::warn!(rule = %rule.name, %err, "url script failed");
                return None;
            }
        };
        let prefix = &full[..scheme_prefix_len(full)];
        let request = if url.is_empty() { addr } else { url.as_str() };
        Some(PendingResolve {
            url: http_prepend(request, Some(prefix), ctx.scheme),
            rule_id: rule.id,
            groups: rule.captured_groups(kind, addr, full),
            loop_param: kind,
            skip_resolve: url.is_empty(),
            target,
        })
    }

    /// Follows a looping rule's single result through the engine again.
    ///
    /// `current_href` is only set on synthetic hops, so a result equal to the
    /// address it came from ends the chain there and never on a page element.
    fn chain(
        &mut self,
        page: &dyn Page,
        annotations: &Annotations,
        matched: Option<(RuleId, MatchKind)>,
        candidates: Candidates,
        origin: ElementId,
        hops: u8,
        current_href: Option<&str>,
    ) -> Result<Candidates, FindOutcome> {
        let Some((rule_id, kind)) = matched else { return Ok(candidates) };
        let loops = self.rules.get(rule_id).is_some_and(|r| r.loops.has(kind));
        let single = match &candidates {
            Candidates::Urls(urls) if loops && urls.len() == 1 => urls[0].clone(),
            _ => return Ok(candidates),
        };
        if current_href == Some(single.as_str()) || hops >= MAX_LOOP_HOPS {
            return Err(FindOutcome::NoMatch);
        }

        let next = Probe::Synthetic { href: single.clone(), origin, hops: hops + 1 };
        match self.find(page, annotations, &next, None) {
            FindOutcome::Resolved(found) => {
                let mut urls = found.urls;
                urls.push(single);
                Ok(Candidates::Urls(urls))
            }
            FindOutcome::Pending(p, details) => Err(FindOutcome::Pending(p, details)),
            FindOutcome::CompileError(err) => Err(FindOutcome::CompileError(err)),
            FindOutcome::NoMatch => Ok(candidates),
        }
    }

    // --- Synthetic probes --------------------------------------------------

    fn find_synthetic(
        &mut self,
        page: &dyn Page,
        annotations: &Annotations,
        href: &str,
        origin: ElementId,
        hops: u8,
    ) -> FindOutcome {
        let mut images = None;
        let (matched, candidates) = match self.apply_link_rules(page, None, href, &mut images, origin) {
            Applied::Matched { rule, kind, candidates } => (Some((rule, kind)), candidates),
            Applied::Pending(p) => return FindOutcome::Pending(p, TargetDetails::default()),
            Applied::Broken(outcome) => return outcome,
            Applied::UseImage { .. } | Applied::Declined | Applied::Unmatched => return FindOutcome::NoMatch,
        };

        let candidates =
            match self.chain(page, annotations, matched, candidates, origin, hops, Some(href)) {
                Ok(c) => c,
                Err(outcome) => return outcome,
            };
        match filter_self_references(candidates, None, &mut Vec::new()) {
            Candidates::Urls(urls) => FindOutcome::Resolved(Found { urls, details: TargetDetails::default() }),
            Candidates::Nothing => FindOutcome::NoMatch,
        }
    }

    // --- Element probes ----------------------------------------------------

    fn find_element(
        &mut self,
        page: &dyn Page,
        annotations: &Annotations,
        trg: ElementId,
        pointer: Option<Point>,
    ) -> FindOutcome {
        let mut details = TargetDetails::default();
        let mut images: Option<Images> = None;
        let mut anchor: Option<(ElementId, String)> = None;
        let mut candidates = Candidates::Nothing;
        let mut matched: Option<(RuleId, MatchKind)> = None;
        let mut resume: Option<(RuleId, bool)> = None;
        let mut via_img_pattern = false;

        let mut node = Some(trg);
        for _ in 0..5 {
            let Some(id) = node else { break };
            let Some(el) = page.element(id) else { break };
            if page.is_body(id) {
                break;
            }
            node = el.parent;
            if !el.is("a") {
                continue;
            }
            let href = match el.href() {
                None => break,
                Some("") => {
                    details.watch = Some(id);
                    break;
                }
                Some(href) => href,
            };
            if contains_embed(page, id) {
                break;
            }
            if let Some(at) = pointer {
                if let Some(found) = probe_point(page, trg, at) {
                    images = Some(found);
                }
            }
            details.watch = Some(id);

            let href = normalize(href, page.location());
            let addr = strip_scheme(&href).to_string();
            anchor = Some((id, href.clone()));
            if images.as_ref().is_some_and(|im| im.is_address(&addr)) {
                break;
            }

            match self.apply_link_rules(page, Some(trg), &href, &mut images, trg) {
                Applied::Matched { rule, kind, candidates: c } => {
                    matched = Some((rule, kind));
                    via_img_pattern = kind == MatchKind::Img;
                    candidates = c;
                }
                Applied::UseImage { rule, bg } => resume = Some((rule, bg)),
                Applied::Pending(p) => return FindOutcome::Pending(p, details),
                Applied::Declined => return FindOutcome::NoMatch,
                Applied::Broken(outcome) => return outcome,
                Applied::Unmatched => {}
            }
            break;
        }

        // Image fallback: rules against what the element displays.
        let mut thumb: Option<(String, bool)> = None;
        if candidates == Candidates::Nothing {
            if let Some(found) = get_images(page, trg) {
                images = Some(found);
            }
            if let Some(im) = images.clone().filter(|im| !im.is_empty()) {
                match self.apply_image_rules(page, trg, &im, resume) {
                    ImageApplied::Matched { rule, candidates: c, bg } => {
                        matched = Some((rule, MatchKind::Img));
                        candidates = c;
                        details.watch = Some(trg);
                        details.no_history = self.settings.history;
                        let full = if bg { im.bg_full.clone() } else { im.src_full.clone() };
                        thumb = full.map(|f| (f, bg));
                    }
                    ImageApplied::Pending(p) => return FindOutcome::Pending(p, details),
                    ImageApplied::Stop(outcome) => return outcome,
                    ImageApplied::Unmatched => {}
                }
            }
        }

        let href = anchor.as_ref().map(|(_, h)| h.as_str());
        candidates = match self.chain(page, annotations, matched, candidates, trg, 0, None) {
            Ok(c) => c,
            Err(outcome) => return outcome,
        };

        if via_img_pattern {
            details.fallback_zoom.extend(href.map(str::to_string));
        }
        let own_src = page
            .element(trg)
            .filter(|e| e.attr("src").is_some())
            .and_then(|e| e.src())
            .map(|s| regex!(r"^https?://").replace(s, "").into_owned());
        candidates = filter_self_references(candidates, own_src.as_deref(), &mut details.fallback_zoom);

        candidates = self.image_size_fallback(page, trg, anchor.as_ref().map(|(id, _)| *id), candidates, &mut details);

        let Candidates::Urls(urls) = candidates else {
            return FindOutcome::NoMatch;
        };

        if let Some((url, trusted)) = thumb {
            details.thumbnail = Some(Thumbnail { url: Some(url), trusted });
        }
        let representative = images.as_ref().and_then(|im| im.src_full.as_deref());
        details.caption = caption::extract(
            page,
            annotations,
            trg,
            anchor.as_ref().map(|(id, h)| (*id, h.as_str())),
            representative,
            self.settings.cap_link_text,
        );
        FindOutcome::Resolved(Found { urls, details })
    }

    fn apply_image_rules(
        &mut self,
        page: &dyn Page,
        trg: ElementId,
        im: &Images,
        resume: Option<(RuleId, bool)>,
    ) -> ImageApplied {
        let scheme = page.scheme();
        let ctx = RewriteContext { page, element: Some(trg), scheme: &scheme };
        let rules = self.rules_arc();
        let start = resume.map_or(0, |(id, _)| id);

        for rule in rules.iter().skip(start) {
            let bg = match resume.filter(|(id, _)| *id == rule.id) {
                Some((_, bg)) => bg,
                None => {
                    let Some(re) = rule.img.as_ref() else { continue };
                    if im.src.as_deref().is_some_and(|s| re.is_match(s)) {
                        false
                    } else if im.bg.as_deref().is_some_and(|s| re.is_match(s)) {
                        true
                    } else {
                        continue;
                    }
                }
            };
            let bg = bg || im.src.is_none();
            let (Some(addr), Some(full)) =
                (if bg { (im.bg.as_deref(), im.bg_full.as_deref()) } else { (im.src.as_deref(), im.src_full.as_deref()) })
            else {
                continue;
            };
            if self.debug_rules {
                tracing::debug!(rule = %rule.name, addr, "image rule matched");
            }

            match self.check_broken(rule) {
                Some(Some(outcome)) => return ImageApplied::Stop(outcome),
                Some(None) => continue,
                None => {}
            }

            if rule.to.is_empty() && rule.is_async() && rule.url.is_some() {
                return match self.pending(rule, MatchKind::Img, addr, full, &ctx, trg) {
                    Some(p) => ImageApplied::Pending(p),
                    None => ImageApplied::Unmatched,
                };
            }

            let prefix = &full[..scheme_prefix_len(full)];
            return match rule.rewrite(MatchKind::Img, addr, prefix, &ctx) {
                Ok(Rewrite::Urls(urls)) => ImageApplied::Matched { rule: rule.id, candidates: Candidates::Urls(urls), bg },
                Ok(Rewrite::Empty | Rewrite::Null) => ImageApplied::Stop(FindOutcome::NoMatch),
                Err(err) => {
                    tracing::warn!(rule = %rule.name, %err, "rule script failed");
                    ImageApplied::Stop(FindOutcome::NoMatch)
                }
            };
        }
        ImageApplied::Unmatched
    }

    /// Responsive-image and clipped-container fallback for plain `img`s.
    fn image_size_fallback(
        &self,
        page: &dyn Page,
        trg: ElementId,
        anchor: Option<ElementId>,
        candidates: Candidates,
        details: &mut TargetDetails,
    ) -> Candidates {
        let Some(el) = page.element(trg) else { return candidates };
        if !el.is("img") || el.attr("src").is_none() {
            return candidates;
        }
        let current = el.src().unwrap_or_default().to_string();
        let mut candidates = candidates;
        if let Candidates::Urls(urls) = &candidates {
            if urls.len() == 1 && urls[0] == current && anchor != Some(trg) {
                candidates = Candidates::Nothing;
            }
        }
        if crate::url::MediaKind::of(&current) == crate::url::MediaKind::Svg {
            return candidates;
        }

        let zr = self.settings.zoom_resized;
        let mut pick = match best_srcset_candidate(page, trg) {
            Some((url, size)) if is_enlargeable(page, trg, Enlarge::Candidate(size), zr) => Some(url),
            _ if is_enlargeable(page, trg, Enlarge::Itself, zr) => Some(current.clone()),
            _ => None,
        };

        let walk = overflow_walk(page, trg, zr, pick.is_some());
        if pick.is_some() {
            details.overflow_parent = walk.parent;
        } else if walk.zoomable {
            pick = Some(current.clone());
            details.fallback_zoom.push(current);
        }

        let Some(pick) = pick else { return candidates };
        details.watch = Some(trg);
        match candidates {
            Candidates::Urls(urls) if urls.len() > 1 => {
                if !details.fallback_zoom.contains(&pick) {
                    details.fallback_zoom.push(pick);
                }
                Candidates::Urls(urls)
            }
            Candidates::Urls(urls) => {
                if urls.first() == Some(&pick) {
                    Candidates::Urls(urls)
                } else {
                    Candidates::Urls(urls.into_iter().chain(std::iter::once(pick)).collect())
                }
            }
            Candidates::Nothing => {
                details.no_history = self.settings.history;
                Candidates::Urls(vec![pick])
            }
        }
    }
}

enum ImageApplied {
    Matched { rule: RuleId, candidates: Candidates, bg: bool },
    Pending(PendingResolve),
    Stop(FindOutcome),
    Unmatched,
}

fn contains_embed(page: &dyn Page, id: ElementId) -> bool {
    let Some(el) = page.element(id) else { return false };
    el.children.iter().any(|c| {
        page.element(*c).is_some_and(|e| matches!(e.tag.as_str(), "iframe" | "object" | "embed")) || contains_embed(page, *c)
    })
}

/// Drops candidates that would just show what is already displayed.
///
/// `#`-prefixed alternates are always kept. When nothing is left the first
/// fallback-zoom URL is used; a lone survivor loses its `#` marker.
fn filter_self_references(candidates: Candidates, own_src: Option<&str>, fallback_zoom: &mut Vec<String>) -> Candidates {
    let Candidates::Urls(urls) = candidates else { return candidates };
    let kept: Vec<String> =
        urls.into_iter().filter(|c| c.starts_with('#') || !own_src.is_some_and(|own| scheme_less_eq(c, own))).collect();
    match kept.len() {
        0 if !fallback_zoom.is_empty() => Candidates::Urls(vec![fallback_zoom.remove(0)]),
        0 => Candidates::Nothing,
        1 => Candidates::Urls(vec![kept[0].strip_prefix('#').unwrap_or(&kept[0]).to_string()]),
        _ => Candidates::Urls(kept),
    }
}
