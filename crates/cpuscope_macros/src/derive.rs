use proc_macro2::*;
use quote::quote;
use syn::*;

/// Parse the derive input and make sure it is a fieldless enum.
fn parse_fieldless_enum(item: TokenStream, derive_name: &str) -> core::result::Result<(Ident, Vec<Variant>), TokenStream> {
	let input_parsed = syn::parse2::<DeriveInput>(item).map_err(|err| err.to_compile_error())?;

	let body_data = match input_parsed.data {
		Data::Enum(body) => body,
		_ => {
			let msg = format!("{derive_name} can only be derived for enums");
			return Err(quote!( compile_error!(#msg); ));
		}
	};

	for variant in &body_data.variants {
		if !matches!(variant.fields, Fields::Unit) {
			let msg = format!("{derive_name} only supports fieldless variants, '{}' has fields", variant.ident);
			return Err(quote!( compile_error!(#msg); ));
		}
	}

	Ok((input_parsed.ident, body_data.variants.into_iter().collect()))
}

/// Collect the string literals of all `#[<attr_name>("..")]` attributes on a variant.
fn string_attrs(variant: &Variant, attr_name: &str) -> core::result::Result<Vec<String>, TokenStream> {
	let mut values = Vec::new();
	for attr in &variant.attrs {
		if !attr.path().is_ident(attr_name) {
			continue;
		}
		let lit = attr.parse_args::<LitStr>().map_err(|err| err.to_compile_error())?;
		values.push(lit.value());
	}
	Ok(values)
}

pub fn enum_count(item: TokenStream) -> TokenStream {
	let (ident, variants) = match parse_fieldless_enum(item, "EnumCount") {
		Ok(parsed) => parsed,
		Err(err) => return err,
	};
	let count = variants.len();

	quote!{
		impl cpuscope_base::EnumCountT for #ident {
			const COUNT: usize = #count;
		}
	}
}

pub fn enum_from_index(item: TokenStream) -> TokenStream {
	let (ident, variants) = match parse_fieldless_enum(item, "EnumFromIndex") {
		Ok(parsed) => parsed,
		Err(err) => return err,
	};

	let mut members = Vec::with_capacity(variants.len());
	let mut indices = Vec::with_capacity(variants.len());
	let mut next = 0usize;
	for variant in variants {
		let idx = match variant.discriminant {
			Some((_, Expr::Lit(ExprLit { lit: Lit::Int(int), .. }))) => match int.base10_parse::<usize>() {
				Ok(int) => int,
				Err(err) => {
					let msg = err.to_string();
					return quote!(compile_error!(#msg););
				},
			},
			Some(_) => return quote!(compile_error!("Only integer discriminants are supported by EnumFromIndex");),
			None => next,
		};

		members.push(variant.ident);
		indices.push(idx);
		next = idx + 1;
	}

	quote!{
		impl cpuscope_base::EnumFromIndexT for #ident {
			fn from_idx(idx: usize) -> Option<Self> {
				match idx {
					#(#indices => Some(Self::#members),)*
					_ => None,
				}
			}

			fn from_idx_or(idx: usize, default: Self) -> Self {
				Self::from_idx(idx).unwrap_or(default)
			}
		}
	}
}

pub fn enum_display(item: TokenStream) -> TokenStream {
	let (ident, variants) = match parse_fieldless_enum(item, "EnumDisplay") {
		Ok(parsed) => parsed,
		Err(err) => return err,
	};

	let mut members = Vec::with_capacity(variants.len());
	let mut names = Vec::with_capacity(variants.len());
	for variant in &variants {
		let name = match string_attrs(variant, "display") {
			Ok(values) => values.into_iter().next().unwrap_or_else(|| variant.ident.to_string()),
			Err(err) => return err,
		};
		members.push(variant.ident.clone());
		names.push(name);
	}

	quote!{
		impl cpuscope_base::EnumNameT for #ident {
			fn name(&self) -> &'static str {
				match self {
					#(#ident::#members => #names,)*
				}
			}
		}

		impl core::fmt::Display for #ident {
			fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
				f.pad(cpuscope_base::EnumNameT::name(self))
			}
		}
	}
}

pub fn enum_from_name(item: TokenStream) -> TokenStream {
	let (ident, variants) = match parse_fieldless_enum(item, "EnumFromName") {
		Ok(parsed) => parsed,
		Err(err) => return err,
	};

	let mut members = Vec::new();
	let mut names = Vec::new();
	for variant in &variants {
		let mut parse_names = match string_attrs(variant, "parse_name") {
			Ok(values) => values,
			Err(err) => return err,
		};
		if parse_names.is_empty() {
			parse_names.push(variant.ident.to_string());
		}
		for name in parse_names {
			members.push(variant.ident.clone());
			names.push(name);
		}
	}

	quote!{
		impl cpuscope_base::EnumFromNameT for #ident {
			fn parse(s: &str) -> Option<Self> {
				match s {
					#(#names => Some(Self::#members),)*
					_ => None,
				}
			}

			fn parse_ignore_case(s: &str) -> Option<Self> {
				#(
					if s.eq_ignore_ascii_case(#names) {
						return Some(Self::#members);
					}
				)*
				None
			}
		}
	}
}
